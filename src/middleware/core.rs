use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::dispatcher::DispatchContext;
use crate::error::{DispatchError, DispatchResult};
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Continuation handed to [`Middleware::process`]: the rest of the chain.
pub type Next<'a> =
    &'a dyn Fn(&mut HttpRequest, &mut DispatchContext) -> DispatchResult<HttpResponse>;

/// Wrapper around the whole request lifecycle.
///
/// Simple middleware implement `before`/`after`; middleware that need to
/// wrap the continuation itself (sessions, spans) override `process`.
pub trait Middleware: Send + Sync {
    /// Returning a response skips the rest of the chain.
    fn before(&self, _req: &HttpRequest) -> Option<HttpResponse> {
        None
    }

    /// Runs once per request that passed `before`. When the rest of the
    /// chain fails with a host fault, `res` is the 500 the application will
    /// answer with and changes to it are discarded.
    fn after(&self, _req: &HttpRequest, _res: &mut HttpResponse, _latency: Duration) {}

    fn process(
        &self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        next: Next<'_>,
    ) -> DispatchResult<HttpResponse> {
        let start = Instant::now();
        let mut res = match self.before(req) {
            Some(res) => res,
            None => match next(req, cx).or_else(DispatchError::recover) {
                Ok(res) => res,
                Err(err) => {
                    let mut failed = HttpResponse::internal_error();
                    self.after(req, &mut failed, start.elapsed());
                    return Err(err);
                }
            },
        };
        self.after(req, &mut res, start.elapsed());
        Ok(res)
    }
}

/// Ordered middleware list; the first entry is outermost.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

type Continuation<'a> =
    Box<dyn Fn(&mut HttpRequest, &mut DispatchContext) -> DispatchResult<HttpResponse> + 'a>;

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run `terminal` wrapped in every middleware.
    ///
    /// The chain is folded right to left so the first middleware sees the
    /// request first and the response last. Response signals are turned into
    /// responses at every boundary, so each `after` sees a concrete response.
    pub fn run<'a>(
        &'a self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        terminal: Next<'a>,
    ) -> DispatchResult<HttpResponse> {
        debug!(
            request_id = %req.request_id(),
            middleware_count = self.middlewares.len(),
            "Running middleware chain"
        );
        let mut next: Continuation<'a> =
            Box::new(move |req: &mut HttpRequest, cx: &mut DispatchContext| {
                terminal(req, cx).or_else(DispatchError::recover)
            });
        for middleware in self.middlewares.iter().rev() {
            let inner = next;
            next = Box::new(move |req: &mut HttpRequest, cx: &mut DispatchContext| {
                middleware
                    .process(req, cx, &*inner)
                    .or_else(DispatchError::recover)
            });
        }
        next(req, cx)
    }
}
