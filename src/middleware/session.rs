use tracing::debug;

use super::{Middleware, Next};
use crate::dispatcher::DispatchContext;
use crate::error::DispatchResult;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Starts the request's session before dispatch and saves it afterwards,
/// whatever the outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionMiddleware;

impl Middleware for SessionMiddleware {
    fn process(
        &self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        next: Next<'_>,
    ) -> DispatchResult<HttpResponse> {
        req.ensure_session().init();
        let result = next(req, cx);
        if let Some(session) = req.session_mut() {
            session.save();
            debug!(request_id = %req.request_id(), "Session saved");
        }
        result
    }
}
