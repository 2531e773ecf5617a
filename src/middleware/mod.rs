//! # Middleware Module
//!
//! Composable wrappers around the full request lifecycle.
//!
//! A [`MiddlewareChain`] folds its middleware around a terminal continuation
//! (kernel boot plus route table dispatch in
//! [`HttpApplication`](crate::application::HttpApplication)). With middleware
//! `[A, B]` around terminal `T` the observed order is
//! `A.before, B.before, T, B.after, A.after`.
//!
//! Provided middleware:
//! - [`SessionMiddleware`] - starts and saves the request's session
//! - [`TracingMiddleware`] - one `request` span per request
//! - [`MetricsMiddleware`] - request, status-class and latency counters

mod core;
mod metrics;
mod session;
mod tracing;

pub use self::core::{Middleware, MiddlewareChain, Next};
pub use self::metrics::MetricsMiddleware;
pub use self::session::SessionMiddleware;
pub use self::tracing::TracingMiddleware;
