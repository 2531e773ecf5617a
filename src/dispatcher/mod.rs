//! # Dispatcher Module
//!
//! Hierarchical action dispatch for matched requests.
//!
//! ## Overview
//!
//! Once the route table has picked a handler class, the dispatcher takes over:
//! - Match the remaining path against the handler's own rules, then against
//!   the rules of every class it extends, most-derived first
//! - Resolve the action the winning rule names (`$Action` → the bound value)
//! - Check that the action exists and is allowed for the current user
//! - Run it, and if the result is another handler, hand it the rest of the
//!   path
//!
//! ## Defining handlers
//!
//! ```rust
//! use std::sync::Arc;
//! use director::dispatcher::{DispatchContext, Handler, HandlerDefinition, Outcome, RequestHandler};
//! use director::registry::ControllerRegistry;
//! use director::request::HttpRequest;
//!
//! let def = HandlerDefinition::<Handler<u32>>::builder("CounterController")
//!     .allow("bump")
//!     .action("bump", |h, _req, _cx| {
//!         h.state += 1;
//!         Ok(Outcome::Body(h.state.to_string()))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let mut handler = Handler::new(def, 41);
//! let mut cx = DispatchContext::new(Arc::new(ControllerRegistry::new()));
//! let mut req = HttpRequest::get("bump");
//! let outcome = handler.handle_request(&mut req, &mut cx).unwrap();
//! assert_eq!(outcome.into_response().body, "42");
//! ```
//!
//! ## Errors
//!
//! Missing actions are 404s and denied actions 403s. Both, like any
//! [`ResponseSignal`](crate::error::ResponseSignal) an action raises, come
//! back from [`RequestHandler::handle_request`] as [`Outcome::Response`].

mod context;
pub mod core;
mod definition;
mod handler;
mod outcome;

pub use context::DispatchContext;
pub use self::core::{check_access_action, handle_request, run_action, Dispatchable, RequestHandler};
pub use definition::{
    Access, ActionEntry, ActionFn, AfterHook, AllowEntry, AllowList, BeforeHook, CheckFn,
    DefinitionBuilder, HandlerDefinition, InitFn, Layer, BASE_CLASS, INDEX_ACTION,
    RESERVED_ACTIONS,
};
pub use handler::Handler;
pub use outcome::{HasRequestHandler, Outcome};
