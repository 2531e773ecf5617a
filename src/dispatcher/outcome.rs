use std::fmt;

use crate::dispatcher::RequestHandler;
use crate::render::RenderContext;
use crate::response::HttpResponse;

/// What an action (or a whole handler dispatch) produced.
pub enum Outcome {
    /// A finished response
    Response(HttpResponse),
    /// A body for the current response
    Body(String),
    /// Data to merge into the render context
    Context(RenderContext),
    /// Another handler that takes over the remaining path
    Delegate(Box<dyn RequestHandler>),
    /// The handler itself; nothing more to do here
    Current,
    /// No output
    Empty,
}

impl Outcome {
    /// Delegate to anything that exposes a request handler.
    pub fn delegate_from<T: HasRequestHandler>(value: T) -> Self {
        Outcome::Delegate(value.into_request_handler())
    }

    #[must_use]
    pub fn is_delegate(&self) -> bool {
        matches!(self, Outcome::Delegate(_))
    }

    /// Collapse into a concrete response at the routing boundary.
    ///
    /// Bodies become HTML pages, render contexts are served as JSON and
    /// everything else is an empty 200.
    #[must_use]
    pub fn into_response(self) -> HttpResponse {
        match self {
            Outcome::Response(response) => response,
            Outcome::Body(body) => HttpResponse::ok(body),
            Outcome::Context(context) => {
                HttpResponse::json(200, &serde_json::Value::Object(context))
            }
            Outcome::Delegate(_) | Outcome::Current | Outcome::Empty => HttpResponse::default(),
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Response(r) => f.debug_tuple("Response").field(&r.status).finish(),
            Outcome::Body(b) => f.debug_tuple("Body").field(b).finish(),
            Outcome::Context(c) => f.debug_tuple("Context").field(c).finish(),
            Outcome::Delegate(h) => f.debug_tuple("Delegate").field(&h.class_name()).finish(),
            Outcome::Current => f.write_str("Current"),
            Outcome::Empty => f.write_str("Empty"),
        }
    }
}

impl From<HttpResponse> for Outcome {
    fn from(response: HttpResponse) -> Self {
        Outcome::Response(response)
    }
}

impl From<String> for Outcome {
    fn from(body: String) -> Self {
        Outcome::Body(body)
    }
}

impl From<&str> for Outcome {
    fn from(body: &str) -> Self {
        Outcome::Body(body.to_string())
    }
}

impl From<RenderContext> for Outcome {
    fn from(context: RenderContext) -> Self {
        Outcome::Context(context)
    }
}

/// Values that are not handlers themselves but can produce one
/// (a page record exposing its controller, for example).
pub trait HasRequestHandler {
    fn into_request_handler(self) -> Box<dyn RequestHandler>;
}

impl HasRequestHandler for Box<dyn RequestHandler> {
    fn into_request_handler(self) -> Box<dyn RequestHandler> {
        self
    }
}
