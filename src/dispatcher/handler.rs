use std::fmt;
use std::sync::Arc;

use super::core::{self as dispatch_core, Dispatchable, RequestHandler};
use super::{DispatchContext, HandlerDefinition, Outcome};
use crate::error::DispatchResult;
use crate::ids::HandlerId;
use crate::request::HttpRequest;

/// Plain request handler: a definition plus per-instance state `S`.
///
/// Actions receive `&mut Handler<S>` and reach their state through
/// [`state`](Handler::state).
pub struct Handler<S> {
    id: HandlerId,
    def: Arc<HandlerDefinition<Handler<S>>>,
    pub state: S,
}

impl<S: 'static> Handler<S> {
    pub fn new(def: Arc<HandlerDefinition<Handler<S>>>, state: S) -> Self {
        Self {
            id: HandlerId::next(),
            def,
            state,
        }
    }

    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Box into a delegation result.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        Outcome::Delegate(Box::new(self))
    }
}

impl<S: 'static> Dispatchable for Handler<S> {
    fn definition(&self) -> &Arc<HandlerDefinition<Self>> {
        &self.def
    }

    fn instance_id(&self) -> HandlerId {
        self.id
    }
}

impl<S: 'static> RequestHandler for Handler<S> {
    fn class_name(&self) -> &str {
        self.def.name()
    }

    fn handler_id(&self) -> HandlerId {
        self.id
    }

    fn handle_request(
        &mut self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
    ) -> DispatchResult<Outcome> {
        dispatch_core::handle_request(self, req, cx)
    }
}

impl<S: fmt::Debug> fmt::Debug for Handler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("class", &self.def.name())
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
