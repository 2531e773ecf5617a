//! # Error Module
//!
//! Error taxonomy for routing and dispatch.
//!
//! Ordinary mismatches never show up here: a rule that does not match yields
//! [`MatchOutcome::NoMatch`](crate::router::MatchOutcome) and the caller moves on.
//! Everything that interrupts dispatch travels as a [`DispatchError`]:
//!
//! - [`DispatchError::Signal`] - a deliberate non-local exit carrying a complete
//!   response (redirects, explicit error pages). Every dispatch boundary converts it
//!   back into its response; it never reaches the transport as a fault.
//! - [`DispatchError::Config`] - a programmer error detected at runtime (missed base
//!   `init` chain, out-of-order controller stack pop, runaway delegation). Logged as a
//!   diagnostic, and only raised when strict mode is on.
//! - [`DispatchError::Fault`] - an unexpected error from action code. Propagates to
//!   the application boundary and becomes a 500.
//!
//! Startup problems (bad rules, unknown controllers, unreadable configuration files)
//! are reported through [`ConfigError`] before any request is served.

use thiserror::Error;

use crate::response::HttpResponse;

/// Result alias used throughout dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// A complete response raised as a non-local exit.
#[derive(Debug, Clone, Error)]
#[error("response signal (status {})", .response.status)]
pub struct ResponseSignal {
    response: HttpResponse,
}

impl ResponseSignal {
    #[must_use]
    pub fn new(response: HttpResponse) -> Self {
        Self { response }
    }

    #[must_use]
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    #[must_use]
    pub fn into_response(self) -> HttpResponse {
        self.response
    }
}

/// Runtime-detected programmer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFault {
    /// An `init` override returned without chaining to its parent.
    #[error("init() on controller '{class}' doesn't chain to its parent init; the base init never ran")]
    MissingBaseInit { class: String },

    /// `pop` was called for a controller that is not on top of the stack.
    #[error("pop called on controller '{class}', but it wasn't at the top of the stack")]
    StackPopOutOfOrder { class: String },

    /// Nested delegation went deeper than the configured bound.
    #[error("nested dispatch into '{class}' exceeded the maximum depth of {max_depth}")]
    DepthExceeded { class: String, max_depth: usize },
}

/// Everything that can interrupt a dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Signal(#[from] ResponseSignal),

    #[error("configuration fault: {0}")]
    Config(#[from] ConfigFault),

    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl DispatchError {
    /// Convert a response signal back into its response; pass anything else through.
    ///
    /// Used at every dispatch and middleware boundary.
    pub fn recover(self) -> DispatchResult<HttpResponse> {
        match self {
            DispatchError::Signal(signal) => Ok(signal.into_response()),
            other => Err(other),
        }
    }

    #[must_use]
    pub fn is_signal(&self) -> bool {
        matches!(self, DispatchError::Signal(_))
    }
}

/// Build an HTTP error signal.
///
/// ```rust
/// use director::error::{http_error, DispatchError};
///
/// let err = http_error(404, "Action 'nope' isn't available");
/// match err {
///     DispatchError::Signal(signal) => assert_eq!(signal.response().status, 404),
///     _ => unreachable!(),
/// }
/// ```
pub fn http_error(status: u16, message: impl Into<String>) -> DispatchError {
    DispatchError::Signal(ResponseSignal::new(HttpResponse::error(status, &message.into())))
}

/// Build a redirect signal (302 unless a different code is given).
pub fn redirect(destination: impl Into<String>, status: Option<u16>) -> DispatchError {
    DispatchError::Signal(ResponseSignal::new(HttpResponse::redirect(
        destination,
        status.unwrap_or(302),
    )))
}

/// Startup and configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("invalid route target for '{rule}': {reason}")]
    InvalidTarget { rule: String, reason: String },

    #[error("route '{rule}' targets unregistered controller '{controller}'")]
    UnknownController { rule: String, controller: String },

    #[error("allowed action '{action}' on '{class}' references unknown check '->{check}'")]
    UnknownCheck {
        class: String,
        action: String,
        check: String,
    },

    #[error("action '{action}' on '{class}' uses a reserved name")]
    ReservedAction { class: String, action: String },

    #[error("unsupported configuration format '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] anyhow::Error),
}
