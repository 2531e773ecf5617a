//! Dispatch core - the per-handler state machine.
//!
//! ```text
//! Idle ──match url_handlers──▶ ActionResolved ──has_action & allowed──▶ Authorized
//!   │ no rule                        │ 404 / 403                           │
//!   ▼                                ▼                                     ▼
//! Current                      Response                              Executed
//!                                                                        │
//!                       Delegate & rule consumed a segment ──▶ Recursed (nested handler)
//!                       path fully parsed                  ──▶ Terminal
//!                       otherwise                          ──▶ 404 "can't handle sub-URLs"
//! ```
//!
//! Response signals raised anywhere below are converted into
//! [`Outcome::Response`] before leaving [`handle_request`].

use std::sync::Arc;

use tracing::{debug, info, trace};

use super::definition::{
    Access, AllowEntry, HandlerDefinition, INDEX_ACTION, RESERVED_ACTIONS,
};
use super::{DispatchContext, Outcome};
use crate::error::{http_error, DispatchResult};
use crate::ids::HandlerId;
use crate::render::RenderContext;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::router::Rule;

/// A handler that can take over (part of) a request.
///
/// Object-safe: route targets and delegation results are handled as
/// `Box<dyn RequestHandler>`.
pub trait RequestHandler: 'static {
    /// Most-derived class name, used in messages and for template lookup
    fn class_name(&self) -> &str;

    /// Instance identity
    fn handler_id(&self) -> HandlerId;

    /// Dispatch the remaining path of `req`.
    fn handle_request(
        &mut self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
    ) -> DispatchResult<Outcome>;
}

/// Static side of a handler: its definition plus the overridable steps of
/// the state machine.
pub trait Dispatchable: Sized + 'static {
    fn definition(&self) -> &Arc<HandlerDefinition<Self>>;

    fn instance_id(&self) -> HandlerId;

    /// Whether `action` is an entry point of this handler.
    fn has_action(&self, action: &str, _cx: &DispatchContext) -> bool {
        self.definition().has_action(action)
    }

    /// Class whose own allow-list governs `action` (`None`: use the merged list).
    fn defining_class(&self, action: &str, _cx: &DispatchContext) -> Option<String> {
        self.definition()
            .action(action)
            .map(|entry| entry.defined_in().to_string())
    }

    /// Run the resolved, authorised action.
    fn handle_action(
        &mut self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
        action: &str,
    ) -> DispatchResult<Outcome> {
        run_action(self, req, cx, action)
    }

    /// Merge a nested handler's render data into this handler's output.
    fn customise(
        &mut self,
        context: RenderContext,
        _cx: &mut DispatchContext,
    ) -> DispatchResult<Outcome> {
        Ok(Outcome::Context(context))
    }
}

/// Run the dispatch state machine for `handler`.
pub fn handle_request<H: Dispatchable>(
    handler: &mut H,
    req: &mut HttpRequest,
    cx: &mut DispatchContext,
) -> DispatchResult<Outcome> {
    match dispatch(handler, req, cx) {
        Ok(outcome) => Ok(outcome),
        Err(err) => err.recover().map(Outcome::Response),
    }
}

fn dispatch<H: Dispatchable>(
    handler: &mut H,
    req: &mut HttpRequest,
    cx: &mut DispatchContext,
) -> DispatchResult<Outcome> {
    let def = Arc::clone(handler.definition());
    let class = def.name();

    let Some((rule, template)) = find_action(&def, req, cx) else {
        debug!(
            request_id = %cx.request_id(),
            handler = class,
            remaining = %req.remaining(),
            "No url_handler matched"
        );
        return Ok(Outcome::Current);
    };

    let action = resolve_action(template, req);
    debug!(
        request_id = %cx.request_id(),
        handler = class,
        rule = %rule,
        action = %action,
        "Action resolved"
    );

    let result = authorize_and_run(handler, &def, &action, req, cx)?;

    match result {
        Outcome::Delegate(mut child)
            if !rule.is_empty_pattern() && child.handler_id() != handler.instance_id() =>
        {
            let nested = cx.dispatch_nested(child.as_mut(), req)?;
            match nested {
                Outcome::Context(context) => handler.customise(context, cx),
                other => Ok(other),
            }
        }
        other if req.all_parsed() => Ok(other),
        _ => {
            info!(
                request_id = %cx.request_id(),
                handler = class,
                remaining = %req.remaining(),
                "Unconsumed sub-URL"
            );
            Err(http_error(
                404,
                format!("I can't handle sub-URLs of a {class} object."),
            ))
        }
    }
}

/// First rule of the most-derived class that matches, walking down to the
/// generic base.
fn find_action<'d, H>(
    def: &'d HandlerDefinition<H>,
    req: &mut HttpRequest,
    cx: &DispatchContext,
) -> Option<(&'d Rule, &'d str)> {
    for layer in def.layers() {
        for (rule, action) in layer.url_handlers() {
            trace!(class = layer.class(), rule = %rule, "Testing url_handler");
            if rule.matches(req, true, cx.routable()).is_match() {
                return Some((rule, action.as_str()));
            }
        }
    }
    None
}

/// Turn an action template into an action name.
///
/// `$Var` takes the latest binding with hyphens normalised to underscores;
/// an empty result means `index`.
fn resolve_action(template: &str, req: &HttpRequest) -> String {
    let action = match template.strip_prefix('$') {
        Some(var) => req.param(var).unwrap_or_default().replace('-', "_"),
        None => template.to_string(),
    };
    if action.is_empty() {
        INDEX_ACTION.to_string()
    } else {
        action
    }
}

fn authorize_and_run<H: Dispatchable>(
    handler: &mut H,
    def: &HandlerDefinition<H>,
    action: &str,
    req: &mut HttpRequest,
    cx: &mut DispatchContext,
) -> DispatchResult<Outcome> {
    let class = def.name();
    let lower = action.to_ascii_lowercase();

    if RESERVED_ACTIONS.contains(&lower.as_str()) {
        return Err(http_error(
            403,
            format!("Action '{action}' isn't allowed on class {class}."),
        ));
    }
    if !handler.has_action(action, cx) {
        return Err(http_error(
            404,
            format!("Action '{action}' isn't available on class {class}."),
        ));
    }
    if !check_access_action(handler, action, req, cx) {
        info!(
            request_id = %cx.request_id(),
            handler = class,
            action = %action,
            user = ?cx.user(),
            "Action access denied"
        );
        return Err(http_error(
            403,
            format!("Action '{action}' isn't allowed on class {class}."),
        ));
    }

    handler.handle_action(req, cx, action)
}

/// Authorise `action` against the allow-list of the class defining it.
///
/// - a plain entry or `Access::Always` permits
/// - `Access::Permission` asks the permission checker about the current user
/// - `Access::Check` runs the named check against the handler
/// - with no allow-list declared, every existing action is permitted
/// - anything else is denied, except `index` (or an empty name) when the
///   list does not mention it
pub fn check_access_action<H: Dispatchable>(
    handler: &H,
    action: &str,
    req: &HttpRequest,
    cx: &DispatchContext,
) -> bool {
    let def = handler.definition();
    let defining = handler.defining_class(action, cx);
    let allowed = def.allowed_actions(defining.as_deref());

    let is_allowed = match allowed.as_ref().map(|list| list.get(action)) {
        None => true,
        Some(Some(AllowEntry::Listed | AllowEntry::Keyed(Access::Always))) => true,
        Some(Some(AllowEntry::Keyed(Access::Permission(code)))) => {
            cx.permissions().check(code, cx.user())
        }
        Some(Some(AllowEntry::Keyed(Access::Check(check)))) => def
            .check(check)
            .is_some_and(|check_fn| check_fn(handler, req, cx)),
        Some(None) => action.is_empty() || action.eq_ignore_ascii_case(INDEX_ACTION),
    };

    trace!(
        handler = def.name(),
        action = %action,
        defining_class = ?defining,
        is_allowed,
        "Access check"
    );
    is_allowed
}

/// Invoke a registered action with the definition's before/after hooks.
///
/// A missing action is a 404 response rather than a signal.
pub fn run_action<H: Dispatchable>(
    handler: &mut H,
    req: &mut HttpRequest,
    cx: &mut DispatchContext,
    action: &str,
) -> DispatchResult<Outcome> {
    let def = Arc::clone(handler.definition());
    let Some(entry) = def.action(action) else {
        return Ok(Outcome::Response(HttpResponse::error(
            404,
            &format!("Action '{action}' isn't available on class {}.", def.name()),
        )));
    };

    if let Some(replaced) = run_before_hooks(handler, &def, req, cx, action)? {
        return Ok(replaced);
    }

    info!(
        request_id = %cx.request_id(),
        handler = def.name(),
        handler_id = %handler.instance_id(),
        action = entry.name(),
        "Running action"
    );
    let result = (entry.func())(handler, req, cx)?;

    run_after_hooks(handler, &def, req, cx, action, result)
}

pub(crate) fn run_before_hooks<H: Dispatchable>(
    handler: &mut H,
    def: &HandlerDefinition<H>,
    req: &mut HttpRequest,
    cx: &mut DispatchContext,
    action: &str,
) -> DispatchResult<Option<Outcome>> {
    for hook in def.before_hooks() {
        if let Some(outcome) = hook(handler, req, cx, action)? {
            debug!(handler = def.name(), action = %action, "before_action short-circuited");
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}

pub(crate) fn run_after_hooks<H: Dispatchable>(
    handler: &mut H,
    def: &HandlerDefinition<H>,
    req: &mut HttpRequest,
    cx: &mut DispatchContext,
    action: &str,
    result: Outcome,
) -> DispatchResult<Outcome> {
    for hook in def.after_hooks() {
        if let Some(outcome) = hook(handler, req, cx, action, &result)? {
            debug!(handler = def.name(), action = %action, "after_action replaced result");
            return Ok(outcome);
        }
    }
    Ok(result)
}
