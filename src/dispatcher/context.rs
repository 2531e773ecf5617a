use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::controller::ControllerStack;
use crate::dispatcher::{Outcome, RequestHandler};
use crate::error::{ConfigFault, DispatchResult};
use crate::ids::RequestId;
use crate::registry::{ControllerRegistry, RoutableNames};
use crate::render::{NullRenderer, Renderer};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::router::RouteTable;
use crate::runtime_config::RuntimeConfig;
use crate::security::{PermissionChecker, StaticPermissions};

/// Per-request dispatch state threaded through every handler.
///
/// Carries the collaborators (registry, permission checker, renderer), the
/// runtime switches, the identity of the current user, this request's
/// controller stack and the current delegation depth.
pub struct DispatchContext {
    request_id: RequestId,
    registry: Arc<ControllerRegistry>,
    permissions: Arc<dyn PermissionChecker>,
    renderer: Arc<dyn Renderer>,
    config: RuntimeConfig,
    user: Option<String>,
    stack: ControllerStack,
    depth: usize,
    routes: Option<Arc<RouteTable>>,
}

impl DispatchContext {
    pub fn new(registry: Arc<ControllerRegistry>) -> Self {
        Self {
            request_id: RequestId::new(),
            registry,
            permissions: Arc::new(StaticPermissions::new()),
            renderer: Arc::new(NullRenderer),
            config: RuntimeConfig::default(),
            user: None,
            stack: ControllerStack::new(),
            depth: 0,
            routes: None,
        }
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

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_routes(mut self, routes: Arc<RouteTable>) -> Self {
        self.routes = Some(routes);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }

    /// Names a `$Controller` variable may match
    #[must_use]
    pub fn routable(&self) -> &dyn RoutableNames {
        self.registry.as_ref()
    }

    #[must_use]
    pub fn permissions(&self) -> &dyn PermissionChecker {
        self.permissions.as_ref()
    }

    #[must_use]
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    /// Shared handle to the renderer, for use while `self` is mutably borrowed
    #[must_use]
    pub fn renderer_handle(&self) -> Arc<dyn Renderer> {
        Arc::clone(&self.renderer)
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Site base URL: the route table's, else the runtime config's
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.routes()
            .and_then(|routes| routes.base_url())
            .or(self.config().base_url.as_deref())
    }

    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, user: Option<String>) {
        self.user = user;
    }

    #[must_use]
    pub fn stack(&self) -> &ControllerStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut ControllerStack {
        &mut self.stack
    }

    /// Nesting level of the handler currently dispatching (0 = route target)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn routes(&self) -> Option<&Arc<RouteTable>> {
        self.routes.as_ref()
    }

    /// Report a configuration fault: logged always, raised in strict mode.
    pub fn config_fault(&self, fault: ConfigFault) -> DispatchResult<()> {
        warn!(
            request_id = %self.request_id,
            strict = self.config.strict,
            fault = %fault,
            "Configuration fault"
        );
        if self.config.strict {
            Err(fault.into())
        } else {
            Ok(())
        }
    }

    /// Hand the remaining path to a delegated handler one level deeper.
    pub fn dispatch_nested(
        &mut self,
        handler: &mut dyn RequestHandler,
        req: &mut HttpRequest,
    ) -> DispatchResult<Outcome> {
        if self.depth >= self.config.max_depth {
            self.config_fault(ConfigFault::DepthExceeded {
                class: handler.class_name().to_string(),
                max_depth: self.config.max_depth,
            })?;
            return Ok(Outcome::Response(HttpResponse::error(
                404,
                &format!(
                    "I can't handle sub-URLs of a {} object.",
                    handler.class_name()
                ),
            )));
        }

        debug!(
            request_id = %self.request_id,
            handler = handler.class_name(),
            handler_id = %handler.handler_id(),
            depth = self.depth + 1,
            remaining = %req.remaining(),
            "Delegating to nested handler"
        );
        self.depth += 1;
        let result = handler.handle_request(req, self);
        self.depth -= 1;
        result
    }

    /// Run `f` against an empty controller stack, restoring the current one
    /// afterwards.
    pub fn with_isolated_stack<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::take(&mut self.stack);
        let saved_depth = std::mem::replace(&mut self.depth, 0);
        let result = f(self);
        self.stack = saved;
        self.depth = saved_depth;
        result
    }

    /// Run a fresh top-level dispatch for `req` from inside a request.
    ///
    /// The sub-request gets its own path and bindings but shares this
    /// request's controller stack.
    pub fn dispatch_subrequest(&mut self, req: &mut HttpRequest) -> DispatchResult<HttpResponse> {
        let routes = self
            .routes
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no route table attached to the dispatch context"))?;
        let saved_depth = std::mem::replace(&mut self.depth, 0);
        let result = routes.handle_request(req, self);
        self.depth = saved_depth;
        result
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("request_id", &self.request_id)
            .field("user", &self.user)
            .field("stack", &self.stack)
            .field("depth", &self.depth)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
