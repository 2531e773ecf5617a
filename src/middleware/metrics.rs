use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Request counters kept in atomics.
///
/// Tracks the request count, responses per status class and the average
/// latency. Updates use `Ordering::Relaxed`; readings are eventually
/// consistent.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    // 1xx..5xx
    status_classes: [AtomicUsize; 5],
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that entered the chain
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses whose status falls in `class` (2 for 2xx, 4 for 4xx, ...)
    pub fn status_count(&self, class: u16) -> usize {
        match class {
            1..=5 => self.status_classes[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// Requests that reached `after`, faults included
    pub fn completed_count(&self) -> usize {
        self.status_classes
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Mean latency over all completed requests
    pub fn average_latency(&self) -> Duration {
        let count = self.completed_count() as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &HttpRequest) -> Option<HttpResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &HttpRequest, res: &mut HttpResponse, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if let 100..=599 = res.status {
            self.status_classes[usize::from(res.status / 100 - 1)].fetch_add(1, Ordering::Relaxed);
        }
    }
}
