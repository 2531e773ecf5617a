//! # Application Module
//!
//! Top of the request lifecycle: wraps kernel boot and route table dispatch
//! in the middleware chain and guarantees teardown.
//!
//! ## Guarantees
//!
//! - `kernel.boot(flush)` runs in the innermost continuation, so middleware
//!   can answer without booting; `?flush` forces a full re-boot
//! - `kernel.shutdown()` runs exactly once per request, whether the chain
//!   returned, raised a fault or panicked
//! - response signals never leave [`HttpApplication::handle`]; faults and
//!   panics become a generic 500
//!
//! ## Example
//!
//! ```rust
//! use director::application::HttpApplication;
//! use director::controller::Controller;
//! use director::dispatcher::Outcome;
//! use director::registry::ControllerRegistry;
//! use director::request::HttpRequest;
//! use director::router::RouteTable;
//!
//! let def = Controller::<()>::definition("HelloController")
//!     .action("index", |_c, _req, _cx| Ok(Outcome::Body("hello".into())))
//!     .build()
//!     .unwrap();
//! let mut registry = ControllerRegistry::new();
//! registry.register_controller(def, || ());
//!
//! let routes = RouteTable::new().with("hello//$Action", "HelloController").unwrap();
//! let app = HttpApplication::new(routes, registry);
//!
//! let response = app.handle(HttpRequest::get("/hello"));
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, "hello");
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use tracing::{debug, error, info};

use crate::dispatcher::DispatchContext;
use crate::error::{DispatchError, DispatchResult};
use crate::kernel::{Kernel, NullKernel};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::registry::ControllerRegistry;
use crate::render::{NullRenderer, Renderer};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::router::RouteTable;
use crate::runtime_config::RuntimeConfig;
use crate::security::{PermissionChecker, StaticPermissions};

/// Query variable that forces a kernel re-boot.
pub const FLUSH_VAR: &str = "flush";

/// Runs `Kernel::shutdown` when dropped.
struct ShutdownGuard<'a> {
    kernel: &'a dyn Kernel,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.kernel.shutdown();
    }
}

/// The routing core wired to its collaborators.
pub struct HttpApplication {
    routes: ArcSwap<RouteTable>,
    registry: Arc<ControllerRegistry>,
    middleware: MiddlewareChain,
    kernel: Arc<dyn Kernel>,
    permissions: Arc<dyn PermissionChecker>,
    renderer: Arc<dyn Renderer>,
    config: RuntimeConfig,
}

impl HttpApplication {
    /// Build an application with runtime switches read from the environment.
    pub fn new(routes: RouteTable, registry: ControllerRegistry) -> Self {
        info!(
            routes_count = routes.len(),
            handlers_count = registry.len(),
            "Application created"
        );
        Self {
            routes: ArcSwap::from_pointee(routes),
            registry: Arc::new(registry),
            middleware: MiddlewareChain::new(),
            kernel: Arc::new(NullKernel),
            permissions: Arc::new(StaticPermissions::new()),
            renderer: Arc::new(NullRenderer),
            config: RuntimeConfig::from_env(),
        }
    }

    #[must_use]
    pub fn with_kernel(mut self, kernel: Arc<dyn Kernel>) -> Self {
        self.kernel = kernel;
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a middleware; earlier middleware wrap later ones.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }

    /// Snapshot of the current route table
    #[must_use]
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    /// Atomically swap the route table; in-flight requests keep the old one.
    pub fn replace_routes(&self, routes: RouteTable) {
        info!(routes_count = routes.len(), "Replacing route table");
        self.routes.store(Arc::new(routes));
    }

    /// Fresh per-request context wired to this application's collaborators.
    #[must_use]
    pub fn context(&self) -> DispatchContext {
        DispatchContext::new(Arc::clone(&self.registry))
            .with_permissions(Arc::clone(&self.permissions))
            .with_renderer(Arc::clone(&self.renderer))
            .with_config(self.config.clone())
            .with_routes(self.routes.load_full())
    }

    /// Handle an anonymous request.
    pub fn handle(&self, mut req: HttpRequest) -> HttpResponse {
        let mut cx = self.context().with_request_id(req.request_id());
        self.handle_with_context(&mut req, &mut cx)
    }

    /// Handle a request on behalf of `user`.
    pub fn handle_as(&self, mut req: HttpRequest, user: &str) -> HttpResponse {
        let mut cx = self
            .context()
            .with_request_id(req.request_id())
            .with_user(user);
        self.handle_with_context(&mut req, &mut cx)
    }

    /// Handle a request with a caller-provided context.
    pub fn handle_with_context(
        &self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
    ) -> HttpResponse {
        let start = Instant::now();
        let flush = req.has_get_var(FLUSH_VAR);
        let _shutdown = ShutdownGuard {
            kernel: self.kernel.as_ref(),
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| self.execute(req, cx, flush)));
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => match err.recover() {
                Ok(response) => response,
                Err(err) => internal_error(req, &err),
            },
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    request_id = %req.request_id(),
                    method = %req.method(),
                    url = %req.url(),
                    panic_message = %message,
                    "Request panicked"
                );
                HttpResponse::internal_error()
            }
        };

        debug!(
            request_id = %req.request_id(),
            status = response.status,
            latency_us = start.elapsed().as_micros(),
            "Request complete"
        );
        response
    }

    /// Run the middleware chain around boot and dispatch.
    pub fn execute(
        &self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        flush: bool,
    ) -> DispatchResult<HttpResponse> {
        let routes = self.routes.load_full();
        let kernel = self.kernel.as_ref();
        let terminal = |req: &mut HttpRequest, cx: &mut DispatchContext| -> DispatchResult<HttpResponse> {
            kernel.boot(flush)?;
            routes.handle_request(req, cx)
        };
        self.middleware.run(req, cx, &terminal)
    }
}

fn internal_error(req: &HttpRequest, err: &DispatchError) -> HttpResponse {
    error!(
        request_id = %req.request_id(),
        method = %req.method(),
        url = %req.url(),
        error = %err,
        "Request failed"
    );
    HttpResponse::internal_error()
}
