//! # Runtime Configuration Module
//!
//! Environment-variable switches for dispatch behaviour.
//!
//! ## Environment Variables
//!
//! ### `DIRECTOR_STRICT`
//!
//! When set to `1`/`true`, configuration faults (an `init` override that never
//! chains to its parent, a controller popped out of order, runaway nested
//! delegation) abort the request with a 500 instead of being logged and ignored.
//! Test suites should run strict.
//!
//! Default: `false`
//!
//! ### `DIRECTOR_MAX_DEPTH`
//!
//! Upper bound on nested handler delegation within one request. Delegation is
//! normally bounded by the path length, but a rule whose variables are all
//! optional can match an exhausted path.
//!
//! Default: `64`
//!
//! ### `DIRECTOR_BASE_URL`
//!
//! Base URL used to absolutize relative redirect destinations from the route table
//! (e.g. `https://example.com/`). Unset means destinations are used as written.
//!
//! ## Usage
//!
//! ```rust
//! use director::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("strict: {}, max depth: {}", config.strict, config.max_depth);
//! ```

use std::env;

/// Default bound on nested delegation.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Raise configuration faults instead of logging them
    pub strict: bool,
    /// Maximum nested dispatch depth per request
    pub max_depth: usize,
    /// Base URL for relative redirect destinations
    pub base_url: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
            base_url: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let strict = env::var("DIRECTOR_STRICT")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let max_depth = match env::var("DIRECTOR_MAX_DEPTH") {
            Ok(val) => val.trim().parse().unwrap_or(DEFAULT_MAX_DEPTH),
            Err(_) => DEFAULT_MAX_DEPTH,
        };
        let base_url = env::var("DIRECTOR_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        RuntimeConfig {
            strict,
            max_depth,
            base_url,
        }
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
