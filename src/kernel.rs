//! Kernel contract: per-request boot and teardown around the pipeline.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

pub trait Kernel: Send + Sync {
    /// Prepare the environment for a request. `flush` forces a full re-boot.
    fn boot(&self, flush: bool) -> anyhow::Result<()>;

    /// Release per-request resources. Runs exactly once per request.
    fn shutdown(&self);
}

/// Kernel with nothing to do.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKernel;

impl Kernel for NullKernel {
    fn boot(&self, _flush: bool) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&self) {}
}

/// Kernel that runs its boot routine once and skips it afterwards unless a
/// flush is requested.
pub struct OnceKernel<F> {
    boot_fn: F,
    booted: AtomicBool,
    boots: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl<F> OnceKernel<F>
where
    F: Fn(bool) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(boot_fn: F) -> Self {
        Self {
            boot_fn,
            booted: AtomicBool::new(false),
            boots: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// How many times the boot routine actually ran
    pub fn boot_count(&self) -> usize {
        self.boots.load(Ordering::Relaxed)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::Relaxed)
    }
}

impl<F> Kernel for OnceKernel<F>
where
    F: Fn(bool) -> anyhow::Result<()> + Send + Sync,
{
    fn boot(&self, flush: bool) -> anyhow::Result<()> {
        if self.booted.load(Ordering::Acquire) && !flush {
            return Ok(());
        }
        debug!(flush, "Kernel boot");
        (self.boot_fn)(flush)?;
        self.boots.fetch_add(1, Ordering::Relaxed);
        self.booted.store(true, Ordering::Release);
        Ok(())
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_once_unless_flushed() {
        let kernel = OnceKernel::new(|_| Ok(()));
        kernel.boot(false).unwrap();
        kernel.boot(false).unwrap();
        assert_eq!(kernel.boot_count(), 1);
        kernel.boot(true).unwrap();
        assert_eq!(kernel.boot_count(), 2);
    }

    #[test]
    fn failed_boot_is_retried() {
        let kernel = OnceKernel::new(|flush| {
            if flush {
                Ok(())
            } else {
                Err(anyhow::anyhow!("database unavailable"))
            }
        });
        assert!(kernel.boot(false).is_err());
        assert_eq!(kernel.boot_count(), 0);
        kernel.boot(true).unwrap();
        assert_eq!(kernel.boot_count(), 1);
    }
}
