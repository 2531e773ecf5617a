use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::templates::{
    action_template_candidates, template_base, viewer_candidates, TemplateOverrides,
    CONTROLLER_CLASS,
};
use crate::dispatcher::core::{run_after_hooks, run_before_hooks};
use crate::dispatcher::{
    handle_request, run_action, DefinitionBuilder, DispatchContext, Dispatchable,
    HandlerDefinition, Outcome, RequestHandler, INDEX_ACTION,
};
use crate::error::{ConfigFault, DispatchError, DispatchResult};
use crate::ids::HandlerId;
use crate::render::RenderContext;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::router::Bindings;

/// Default rule of every controller: the first segment names the action,
/// the next two are parsed as `ID` and `OtherID` but left on the path.
pub const CONTROLLER_URL_HANDLER: &str = "$Action//$ID/$OtherID";

/// A handler with a response of its own.
///
/// On top of plain dispatch a controller
/// - registers itself on the request's controller stack while it runs
/// - runs its `init` chain before any action; every init hook must call
///   [`init_parent`](Controller::init_parent)
/// - renders template output for actions that return render data, or for
///   actions that only exist as templates
pub struct Controller<S> {
    id: HandlerId,
    def: Arc<HandlerDefinition<Controller<S>>>,
    pub state: S,
    response: HttpResponse,
    url_params: Bindings,
    action: Option<String>,
    base_init_called: bool,
    init_cursor: usize,
    overrides: TemplateOverrides,
}

impl<S: 'static> Controller<S> {
    /// Definition builder pre-seeded with the `Controller` base class.
    pub fn definition(name: impl Into<String>) -> DefinitionBuilder<Controller<S>> {
        HandlerDefinition::builder(CONTROLLER_CLASS)
            .url_handler(CONTROLLER_URL_HANDLER, "$Action")
            .class(name)
    }

    pub fn new(def: Arc<HandlerDefinition<Controller<S>>>, state: S) -> Self {
        Self {
            id: HandlerId::next(),
            def,
            state,
            response: HttpResponse::default(),
            url_params: Bindings::new(),
            action: None,
            base_init_called: false,
            init_cursor: 0,
            overrides: TemplateOverrides::default(),
        }
    }

    /// Template for one action, bypassing ancestry lookup.
    #[must_use]
    pub fn with_action_template(mut self, action: &str, template: impl Into<String>) -> Self {
        self.overrides
            .templates
            .insert(action.to_string(), template.into());
        self
    }

    /// Template for every action, bypassing ancestry lookup.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.overrides.template = Some(template.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    #[must_use]
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    /// Bindings accumulated from every match this controller handled
    #[must_use]
    pub fn url_params(&self) -> &Bindings {
        &self.url_params
    }

    /// Action currently being handled
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Chain to the next init hook up the ancestry, ending in the base init.
    pub fn init_parent(
        &mut self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
    ) -> DispatchResult<()> {
        let def = Arc::clone(&self.def);
        match def.init_hooks().get(self.init_cursor) {
            Some(hook) => {
                self.init_cursor += 1;
                hook(self, req, cx)
            }
            None => {
                self.base_init_called = true;
                Ok(())
            }
        }
    }

    fn do_init(&mut self, req: &mut HttpRequest, cx: &mut DispatchContext) -> DispatchResult<()> {
        self.base_init_called = false;
        self.init_cursor = 0;
        self.init_parent(req, cx)?;
        if !self.base_init_called {
            cx.config_fault(ConfigFault::MissingBaseInit {
                class: self.def.name().to_string(),
            })?;
        }
        Ok(())
    }

    /// Finish the response with a redirect.
    pub fn redirect(&mut self, destination: &str, status: Option<u16>) -> Outcome {
        debug!(controller = self.def.name(), destination, "Redirecting");
        self.response = HttpResponse::redirect(destination, status.unwrap_or(302));
        Outcome::Response(self.response.clone())
    }

    /// Redirect to the `BackURL` request variable, else to the referrer,
    /// else to the site root. Only local paths and URLs on the site's base
    /// URL are followed.
    pub fn redirect_back(&mut self, req: &HttpRequest, cx: &DispatchContext) -> Outcome {
        let base_url = cx.base_url();
        let back = [req.request_var("BackURL"), req.header("referer")]
            .into_iter()
            .flatten()
            .find(|url| is_site_url(url, base_url))
            .unwrap_or("/")
            .to_string();
        self.redirect(&back, None)
    }

    /// Ordered template candidates for `action`.
    #[must_use]
    pub fn viewer_candidates(&self, action: &str) -> Vec<String> {
        viewer_candidates(self.def.ancestry(), action, &self.overrides)
    }

    /// Whether a subclass provides a `Class_action` template (or an override
    /// names one).
    #[must_use]
    pub fn has_action_template(&self, action: &str, cx: &DispatchContext) -> bool {
        if self.overrides.templates.contains_key(action) {
            return true;
        }
        let candidates = action_template_candidates(self.def.ancestry(), action);
        cx.renderer().has_template(&candidates)
    }

    /// Data every template of this controller sees.
    fn template_context(&self, extra: RenderContext) -> RenderContext {
        let mut context = RenderContext::new();
        context.insert("ClassName".into(), Value::String(self.def.name().to_string()));
        context.insert(
            "Action".into(),
            self.action
                .as_ref()
                .map_or(Value::Null, |a| Value::String(a.clone())),
        );
        let params = self
            .url_params
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    v.map_or(Value::Null, |v| Value::String(v.to_string())),
                )
            })
            .collect();
        context.insert("URLParams".into(), Value::Object(params));
        context.extend(extra);
        context
    }

    /// Render `action`'s template with `extra`; without any template the
    /// data is served as JSON.
    fn render_action(
        &mut self,
        action: &str,
        extra: RenderContext,
        cx: &DispatchContext,
    ) -> DispatchResult<Outcome> {
        let candidates = self.viewer_candidates(action);
        let context = self.template_context(extra);
        if !cx.renderer().has_template(&candidates) {
            debug!(
                controller = self.def.name(),
                candidates = ?candidates,
                "No template found; serving render data as JSON"
            );
            return Ok(Outcome::Response(HttpResponse::json(
                self.response.status,
                &Value::Object(context),
            )));
        }
        let body = cx
            .renderer()
            .render(&candidates, &context)
            .map_err(anyhow::Error::from)?;
        Ok(Outcome::Body(body))
    }

    fn prepare_response(&mut self, outcome: Outcome, cx: &mut DispatchContext) -> DispatchResult<()> {
        match outcome {
            Outcome::Response(response) => self.response = response,
            Outcome::Body(body) => self.response.set_body(body),
            Outcome::Context(context) => {
                let action = self.action.clone().unwrap_or_else(|| INDEX_ACTION.to_string());
                let rendered = self.render_action(&action, context, cx)?;
                return self.prepare_response(rendered, cx);
            }
            Outcome::Current => {
                let action = self.action.clone().unwrap_or_else(|| INDEX_ACTION.to_string());
                if cx.renderer().has_template(&self.viewer_candidates(&action)) {
                    let rendered = self.render_action(&action, RenderContext::new(), cx)?;
                    return self.prepare_response(rendered, cx);
                }
            }
            Outcome::Delegate(_) | Outcome::Empty => {}
        }
        if self.response.header("content-type").is_none() {
            self.response
                .set_header("content-type", "text/html; charset=utf-8".to_string());
        }
        Ok(())
    }

    fn run_request(&mut self, req: &mut HttpRequest, cx: &mut DispatchContext) -> DispatchResult<()> {
        self.response = HttpResponse::default();
        match self.do_init(req, cx) {
            Ok(()) => {}
            Err(DispatchError::Signal(signal)) => {
                self.response = signal.into_response();
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        if self.response.is_finished() {
            info!(
                request_id = %cx.request_id(),
                controller = self.def.name(),
                status = self.response.status,
                "Response finished during init"
            );
            return Ok(());
        }

        let outcome = handle_request(self, req, cx)?;
        self.prepare_response(outcome, cx)
    }
}

impl<S: 'static> Dispatchable for Controller<S> {
    fn definition(&self) -> &Arc<HandlerDefinition<Self>> {
        &self.def
    }

    fn instance_id(&self) -> HandlerId {
        self.id
    }

    fn has_action(&self, action: &str, cx: &DispatchContext) -> bool {
        self.def.has_action(action) || self.has_action_template(action, cx)
    }

    /// Registered actions belong to their declaring class; template-only
    /// actions to the most-derived class providing `Class_action`.
    fn defining_class(&self, action: &str, cx: &DispatchContext) -> Option<String> {
        if let Some(entry) = self.def.action(action) {
            return Some(entry.defined_in().to_string());
        }
        self.def
            .ancestry()
            .take_while(|class| *class != crate::dispatcher::BASE_CLASS)
            .find(|class| {
                cx.renderer()
                    .has_template(&[format!("{}_{action}", template_base(class))])
            })
            .map(str::to_string)
    }

    fn handle_action(
        &mut self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        action: &str,
    ) -> DispatchResult<Outcome> {
        self.url_params.merge(req.latest_params());
        self.action = Some(action.to_string());

        if self.def.action(action).is_some() {
            return match run_action(self, req, cx, action)? {
                Outcome::Context(context) => self.render_action(action, context, cx),
                other => Ok(other),
            };
        }

        let def = Arc::clone(&self.def);
        if let Some(replaced) = run_before_hooks(self, &def, req, cx, action)? {
            return Ok(replaced);
        }
        let candidates = self.viewer_candidates(action);
        let result = if cx.renderer().has_template(&candidates) {
            self.render_action(action, RenderContext::new(), cx)?
        } else {
            Outcome::Current
        };
        run_after_hooks(self, &def, req, cx, action, result)
    }

    fn customise(
        &mut self,
        context: RenderContext,
        _cx: &mut DispatchContext,
    ) -> DispatchResult<Outcome> {
        Ok(Outcome::Context(self.template_context(context)))
    }
}

impl<S: 'static> RequestHandler for Controller<S> {
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
        let class = self.def.name().to_string();
        cx.stack_mut().push(self.id, class.as_str());

        let result = self.run_request(req, cx);

        let popped = cx.stack_mut().pop(self.id, &class);
        result?;
        if let Err(fault) = popped {
            cx.config_fault(fault)?;
        }
        Ok(Outcome::Response(std::mem::take(&mut self.response)))
    }
}

/// A root-relative path, or an absolute URL with the same origin as `base_url`.
fn is_site_url(candidate: &str, base_url: Option<&str>) -> bool {
    if candidate.starts_with('/') {
        return !candidate.starts_with("//") && !candidate.starts_with("/\\");
    }
    let Some(base) = base_url.and_then(|b| url::Url::parse(b).ok()) else {
        return false;
    };
    url::Url::parse(candidate).is_ok_and(|url| url.origin() == base.origin())
}

impl<S: fmt::Debug> fmt::Debug for Controller<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("class", &self.def.name())
            .field("id", &self.id)
            .field("action", &self.action)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
