//! # Controller Module
//!
//! Controllers are handlers that own a response.
//!
//! ## Lifecycle
//!
//! For every request a controller:
//! 1. pushes itself onto the request's [`ControllerStack`]
//! 2. resets its response and runs the `init` chain; a redirect or error
//!    response set during init ends the request there
//! 3. dispatches like any handler (see [`dispatcher`](crate::dispatcher))
//! 4. folds the action result into its response, rendering templates for
//!    render data
//! 5. pops itself off the stack, also when dispatch failed
//!
//! ## Templates
//!
//! Output templates are looked up along the class ancestry: for action
//! `edit` on `PageController extends ContentController` the candidates are
//! `PageController_edit`, `ContentController_edit`, `Controller_edit`,
//! `PageController`, `ContentController`, `Controller`. Class names are cut
//! at the first `_`.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use director::controller::Controller;
//! use director::dispatcher::{DispatchContext, Outcome, RequestHandler};
//! use director::registry::ControllerRegistry;
//! use director::request::HttpRequest;
//!
//! let def = Controller::<()>::definition("PageController")
//!     .allow("show")
//!     .action("show", |c, req, _cx| {
//!         let id = req.param("ID").unwrap_or("none").to_string();
//!         Ok(Outcome::Body(format!("{} #{id}", c.action().unwrap_or_default())))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let mut controller = Controller::new(def, ());
//! let mut cx = DispatchContext::new(Arc::new(ControllerRegistry::new()));
//! let mut req = HttpRequest::get("show/42");
//! let response = controller.handle_request(&mut req, &mut cx).unwrap().into_response();
//! assert_eq!(response.body, "show #42");
//! assert!(cx.stack().is_empty());
//! ```

mod core;
mod stack;
mod templates;

pub use self::core::{Controller, CONTROLLER_URL_HANDLER};
pub use stack::{ControllerFrame, ControllerStack};
pub use templates::{
    action_template_candidates, template_base, viewer_candidates, TemplateOverrides,
    CONTROLLER_CLASS,
};
