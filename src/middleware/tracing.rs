use std::time::Instant;

use tracing::{field, info_span};

use super::{Middleware, Next};
use crate::dispatcher::DispatchContext;
use crate::error::DispatchResult;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Opens one `request` span per request; status and latency are recorded
/// on it when the chain unwinds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn process(
        &self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        next: Next<'_>,
    ) -> DispatchResult<HttpResponse> {
        let span = info_span!(
            "request",
            request_id = %req.request_id(),
            method = %req.method(),
            url = %req.url(),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let _entered = span.enter();
        let start = Instant::now();

        let result = next(req, cx);

        let status = match &result {
            Ok(res) => res.status,
            Err(_) => 500,
        };
        span.record("status", &status);
        span.record("latency_ms", &(start.elapsed().as_millis() as u64));
        result
    }
}
