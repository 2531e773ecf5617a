//! # Director
//!
//! **Director** is a hierarchical HTTP request router and dispatcher. A global,
//! ordered route table picks the handler class for a URL; that handler then
//! matches the *remaining* path against its own rules, picks an action,
//! authorises it against an allow-list and either answers or delegates the
//! rest of the path to a nested handler.
//!
//! ## Architecture
//!
//! - **[`router`]** - rule parsing and matching, the global [`RouteTable`](router::RouteTable)
//! - **[`dispatcher`]** - the per-handler dispatch state machine and handler definitions
//! - **[`controller`]** - handlers with init chains, a response of their own and template rendering
//! - **[`middleware`]** - the request pipeline wrapped around boot and dispatch
//! - **[`application`]** - [`HttpApplication`](application::HttpApplication), the top of the lifecycle
//! - **[`config`]** - route table files (YAML, JSON, TOML)
//! - **[`registry`]** - name → handler factory lookup
//!
//! ### Request Flow
//!
//! ```text
//! HttpApplication::handle
//!   └─ MiddlewareChain (outermost first)
//!        └─ Kernel::boot ── RouteTable::handle_request
//!             ├─ no rule        → 404 "No URL rule was matched"
//!             ├─ ->destination  → redirect
//!             └─ handler.handle_request
//!                  ├─ url_handlers → action → allow-list → run
//!                  └─ Delegate(child) → child.handle_request (remaining path)
//!   └─ Kernel::shutdown (always, exactly once)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use director::prelude::*;
//!
//! let team = HandlerDefinition::<Handler<()>>::builder("TeamHandler")
//!     .url_handler("$Action!", "$Action")
//!     .action("members", |_h, _req, _cx| Ok(Outcome::Body("alice, bob".into())))
//!     .allow("members")
//!     .build()
//!     .unwrap();
//! let team_def = team.clone();
//!
//! let admin = Controller::<()>::definition("AdminController")
//!     .url_handler("team//$Rest", "team")
//!     .action("team", move |_c, _req, _cx| {
//!         Ok(Outcome::Delegate(Box::new(Handler::new(team_def.clone(), ()))))
//!     })
//!     .allow("team")
//!     .build()
//!     .unwrap();
//!
//! let mut registry = ControllerRegistry::new();
//! registry.register_handler(team, || ());
//! registry.register_controller(admin, || ());
//!
//! let routes = RouteTable::new().with("admin", "AdminController").unwrap();
//! let app = HttpApplication::new(routes, registry);
//!
//! let response = app.handle(HttpRequest::get("/admin/team/members"));
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, "alice, bob");
//! ```
//!
//! ## Configuration
//!
//! Runtime switches come from the environment (see [`runtime_config`]);
//! route tables can be loaded from files with [`config::load_config`].
//!
//! ## Logging
//!
//! Every stage emits structured `tracing` events keyed by `request_id`.
//! The library never installs a subscriber; the `director` binary does so
//! through [`logging::init_logging`].

pub mod application;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod kernel;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod render;
pub mod request;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod security;
pub mod session;

pub use application::HttpApplication;
pub use error::{ConfigError, ConfigFault, DispatchError, DispatchResult};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use router::RouteTable;

/// Everything needed to define handlers and serve requests.
pub mod prelude {
    pub use crate::application::HttpApplication;
    pub use crate::controller::Controller;
    pub use crate::dispatcher::{
        Access, DispatchContext, Dispatchable, Handler, HandlerDefinition, Outcome,
        RequestHandler,
    };
    pub use crate::error::{http_error, redirect, DispatchError, DispatchResult};
    pub use crate::registry::ControllerRegistry;
    pub use crate::request::HttpRequest;
    pub use crate::response::HttpResponse;
    pub use crate::router::RouteTable;
}
