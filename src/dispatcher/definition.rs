//! Handler definitions: the declared rule sets, allow-lists and actions of a
//! handler class and of every class it extends.
//!
//! A definition is built once at startup and shared by every instance:
//!
//! ```rust
//! use director::dispatcher::{Access, Handler, HandlerDefinition, Outcome};
//!
//! let def = HandlerDefinition::<Handler<()>>::builder("ReportController")
//!     .url_handler("export/$Format!", "export")
//!     .allow("export")
//!     .allow_with("purge", Access::Permission("ADMIN".into()))
//!     .action("export", |_h, req, _cx| {
//!         Ok(Outcome::Body(format!("exporting {}", req.param("Format").unwrap_or_default())))
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(def.name(), "ReportController");
//! assert!(def.has_action("export"));
//! assert!(def.has_action("index"));
//! assert!(!def.has_action("missing"));
//! ```
//!
//! Classes are declared base first with [`DefinitionBuilder::class`]; rules,
//! allow-list entries and actions attach to the most recently declared class.
//! Allow-lists are scoped: an action is authorised against the allow-list of
//! the class that defines it, not against entries inherited from elsewhere.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatcher::{DispatchContext, Outcome};
use crate::error::{ConfigError, DispatchResult};
use crate::request::HttpRequest;
use crate::router::Rule;

/// Generic base class every handler extends; maps `$Action` to itself.
pub const BASE_CLASS: &str = "RequestHandler";

/// Names that can never be dispatched to as actions.
pub const RESERVED_ACTIONS: [&str; 3] = ["init", "handle_request", "handle_action"];

/// Default action when a rule resolves to an empty name.
pub const INDEX_ACTION: &str = "index";

pub type ActionFn<H> = Arc<
    dyn Fn(&mut H, &mut HttpRequest, &mut DispatchContext) -> DispatchResult<Outcome> + Send + Sync,
>;

pub type CheckFn<H> = Arc<dyn Fn(&H, &HttpRequest, &DispatchContext) -> bool + Send + Sync>;

/// Runs before an action; returning `Some` replaces the action's result.
pub type BeforeHook<H> = Arc<
    dyn Fn(&mut H, &mut HttpRequest, &mut DispatchContext, &str) -> DispatchResult<Option<Outcome>>
        + Send
        + Sync,
>;

/// Runs after an action; returning `Some` replaces its result.
pub type AfterHook<H> = Arc<
    dyn Fn(
            &mut H,
            &mut HttpRequest,
            &mut DispatchContext,
            &str,
            &Outcome,
        ) -> DispatchResult<Option<Outcome>>
        + Send
        + Sync,
>;

pub type InitFn<H> =
    Arc<dyn Fn(&mut H, &mut HttpRequest, &mut DispatchContext) -> DispatchResult<()> + Send + Sync>;

/// Condition attached to an allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Always permitted
    Always,
    /// Permitted when the current user holds this permission code
    Permission(String),
    /// Permitted when the named check registered on the definition passes
    Check(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowEntry {
    /// Plain list entry, always permitted
    Listed,
    /// Entry with an explicit condition
    Keyed(Access),
}

/// Ordered allow-list with lowercase action names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<(String, AllowEntry)>,
}

impl AllowList {
    pub fn insert(&mut self, action: &str, entry: AllowEntry) {
        let action = action.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(name, _)| *name == action) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((action, entry)),
        }
    }

    #[must_use]
    pub fn get(&self, action: &str) -> Option<&AllowEntry> {
        let action = action.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| *name == action)
            .map(|(_, entry)| entry)
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.get(action).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AllowEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn extend_from(&mut self, other: &AllowList) {
        for (name, entry) in &other.entries {
            self.insert(name, entry.clone());
        }
    }
}

/// One class in a handler's ancestry.
pub struct Layer<H> {
    class: String,
    url_handlers: Vec<(Rule, String)>,
    allowed_actions: Option<AllowList>,
    init: Option<InitFn<H>>,
}

impl<H> Layer<H> {
    fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            url_handlers: Vec::new(),
            allowed_actions: None,
            init: None,
        }
    }

    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Rules of this class only, in declaration order
    #[must_use]
    pub fn url_handlers(&self) -> &[(Rule, String)] {
        &self.url_handlers
    }

    /// This class's own allow-list (`None` when it declares none)
    #[must_use]
    pub fn allowed_actions(&self) -> Option<&AllowList> {
        self.allowed_actions.as_ref()
    }
}

pub struct ActionEntry<H> {
    name: String,
    defined_in: String,
    func: ActionFn<H>,
}

impl<H> ActionEntry<H> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class that declared the action
    #[must_use]
    pub fn defined_in(&self) -> &str {
        &self.defined_in
    }

    #[must_use]
    pub fn func(&self) -> &ActionFn<H> {
        &self.func
    }
}

/// Immutable, shared description of a handler class.
pub struct HandlerDefinition<H> {
    name: String,
    layers: Vec<Layer<H>>,
    actions: HashMap<String, ActionEntry<H>>,
    checks: HashMap<String, CheckFn<H>>,
    before: Vec<BeforeHook<H>>,
    after: Vec<AfterHook<H>>,
    init_hooks: Vec<InitFn<H>>,
}

impl<H> HandlerDefinition<H> {
    /// Start a definition whose first (base-most) declared class is `class`.
    pub fn builder(class: impl Into<String>) -> DefinitionBuilder<H> {
        DefinitionBuilder {
            layers: vec![Layer::new(class)],
            actions: Vec::new(),
            checks: HashMap::new(),
            before: Vec::new(),
            after: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Most-derived class name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layers from the most-derived class down to the generic base
    #[must_use]
    pub fn layers(&self) -> &[Layer<H>] {
        &self.layers
    }

    pub fn ancestry(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.class.as_str())
    }

    #[must_use]
    pub fn layer(&self, class: &str) -> Option<&Layer<H>> {
        self.layers.iter().find(|l| l.class.eq_ignore_ascii_case(class))
    }

    /// Registered action, looked up case-insensitively
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionEntry<H>> {
        self.actions.get(&name.to_ascii_lowercase())
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionEntry<H>> {
        self.actions.values()
    }

    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckFn<H>> {
        self.checks.get(name)
    }

    #[must_use]
    pub fn before_hooks(&self) -> &[BeforeHook<H>] {
        &self.before
    }

    #[must_use]
    pub fn after_hooks(&self) -> &[AfterHook<H>] {
        &self.after
    }

    /// Init hooks, most-derived first
    #[must_use]
    pub fn init_hooks(&self) -> &[InitFn<H>] {
        &self.init_hooks
    }

    /// Allow-list used to authorise an action.
    ///
    /// With a class, that class's own list (uninherited). Without one, the
    /// lists of the whole ancestry merged, derived entries overriding base
    /// ones; `None` when no class declares a list at all.
    #[must_use]
    pub fn allowed_actions(&self, class: Option<&str>) -> Option<Cow<'_, AllowList>> {
        if let Some(class) = class {
            return self
                .layer(class)
                .and_then(|l| l.allowed_actions.as_ref())
                .map(Cow::Borrowed);
        }

        let mut merged: Option<AllowList> = None;
        for layer in self.layers.iter().rev() {
            if let Some(list) = &layer.allowed_actions {
                merged.get_or_insert_with(AllowList::default).extend_from(list);
            }
        }
        merged.map(Cow::Owned)
    }

    /// Whether `action` names an entry point: `index`, anything on an
    /// allow-list, or a registered action.
    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        if action.eq_ignore_ascii_case(INDEX_ACTION) {
            return true;
        }
        if self
            .allowed_actions(None)
            .is_some_and(|list| list.contains(action))
        {
            return true;
        }
        self.action(action).is_some()
    }
}

impl<H> fmt::Debug for HandlerDefinition<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.actions.values().map(|a| a.name.as_str()).collect();
        actions.sort_unstable();
        f.debug_struct("HandlerDefinition")
            .field("name", &self.name)
            .field("ancestry", &self.ancestry().collect::<Vec<_>>())
            .field("actions", &actions)
            .finish()
    }
}

/// Builder for [`HandlerDefinition`].
pub struct DefinitionBuilder<H> {
    layers: Vec<Layer<H>>,
    actions: Vec<ActionEntry<H>>,
    checks: HashMap<String, CheckFn<H>>,
    before: Vec<BeforeHook<H>>,
    after: Vec<AfterHook<H>>,
    errors: Vec<ConfigError>,
}

impl<H> DefinitionBuilder<H> {
    fn current(&mut self) -> &mut Layer<H> {
        if self.layers.is_empty() {
            self.layers.push(Layer::new(BASE_CLASS));
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    fn current_class(&self) -> String {
        self.layers
            .last()
            .map_or_else(|| BASE_CLASS.to_string(), |l| l.class.clone())
    }

    /// Declare a subclass of everything declared so far.
    #[must_use]
    pub fn class(mut self, name: impl Into<String>) -> Self {
        self.layers.push(Layer::new(name));
        self
    }

    /// Add a rule to the current class. `action` is a literal action name
    /// or `$Var` to take the action from a binding.
    #[must_use]
    pub fn url_handler(mut self, pattern: &str, action: impl Into<String>) -> Self {
        match Rule::parse(pattern) {
            Ok(rule) => self.current().url_handlers.push((rule, action.into())),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Register an action on the current class. Redeclaring a name in a
    /// later class overrides it.
    #[must_use]
    pub fn action<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&mut H, &mut HttpRequest, &mut DispatchContext) -> DispatchResult<Outcome>
            + Send
            + Sync
            + 'static,
    {
        let defined_in = self.current_class();
        if RESERVED_ACTIONS.contains(&name.to_ascii_lowercase().as_str()) {
            self.errors.push(ConfigError::ReservedAction {
                class: defined_in,
                action: name.to_string(),
            });
            return self;
        }
        self.actions.push(ActionEntry {
            name: name.to_string(),
            defined_in,
            func: Arc::new(func),
        });
        self
    }

    /// Allow `action` unconditionally.
    #[must_use]
    pub fn allow(mut self, action: &str) -> Self {
        self.allow_list().insert(action, AllowEntry::Listed);
        self
    }

    #[must_use]
    pub fn allow_with(mut self, action: &str, access: Access) -> Self {
        self.allow_list().insert(action, AllowEntry::Keyed(access));
        self
    }

    /// Allow `action` when the current user holds `code`.
    #[must_use]
    pub fn allow_permission(self, action: &str, code: impl Into<String>) -> Self {
        self.allow_with(action, Access::Permission(code.into()))
    }

    /// Allow `action` when the check registered as `check` passes.
    #[must_use]
    pub fn allow_if(self, action: &str, check: impl Into<String>) -> Self {
        self.allow_with(action, Access::Check(check.into()))
    }

    /// Declare an explicitly empty allow-list on the current class.
    #[must_use]
    pub fn allow_none(mut self) -> Self {
        self.allow_list();
        self
    }

    /// Register a named access check for `Access::Check` entries.
    #[must_use]
    pub fn check<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&H, &HttpRequest, &DispatchContext) -> bool + Send + Sync + 'static,
    {
        self.checks.insert(name.into(), Arc::new(func));
        self
    }

    #[must_use]
    pub fn before_action<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut H, &mut HttpRequest, &mut DispatchContext, &str) -> DispatchResult<Option<Outcome>>
            + Send
            + Sync
            + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn after_action<F>(mut self, hook: F) -> Self
    where
        F: Fn(
                &mut H,
                &mut HttpRequest,
                &mut DispatchContext,
                &str,
                &Outcome,
            ) -> DispatchResult<Option<Outcome>>
            + Send
            + Sync
            + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    /// Set the init hook of the current class (controllers only).
    #[must_use]
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut H, &mut HttpRequest, &mut DispatchContext) -> DispatchResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.current().init = Some(Arc::new(hook));
        self
    }

    fn allow_list(&mut self) -> &mut AllowList {
        self.current()
            .allowed_actions
            .get_or_insert_with(AllowList::default)
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<Arc<HandlerDefinition<H>>, ConfigError> {
        let DefinitionBuilder {
            mut layers,
            actions,
            checks,
            before,
            after,
            errors,
        } = self;

        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        for layer in &layers {
            let Some(list) = &layer.allowed_actions else {
                continue;
            };
            for (action, entry) in list.iter() {
                if let AllowEntry::Keyed(Access::Check(check)) = entry {
                    if !checks.contains_key(check) {
                        return Err(ConfigError::UnknownCheck {
                            class: layer.class.clone(),
                            action: action.to_string(),
                            check: check.clone(),
                        });
                    }
                }
            }
        }

        let name = layers
            .last()
            .map_or_else(|| BASE_CLASS.to_string(), |l| l.class.clone());

        layers.reverse();
        if !layers.iter().any(|l| l.class == BASE_CLASS) {
            let mut base = Layer::new(BASE_CLASS);
            base.url_handlers
                .push((Rule::parse("$Action")?, "$Action".to_string()));
            layers.push(base);
        }

        let init_hooks = layers.iter().filter_map(|l| l.init.clone()).collect();
        let actions = actions
            .into_iter()
            .map(|a| (a.name.to_ascii_lowercase(), a))
            .collect();

        Ok(Arc::new(HandlerDefinition {
            name,
            layers,
            actions,
            checks,
            before,
            after,
            init_hooks,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Handler;

    type Def = HandlerDefinition<Handler<()>>;

    #[test]
    fn layers_are_most_derived_first_with_base_last() {
        let def = Def::builder("Page")
            .class("PageController")
            .class("HomePageController")
            .build()
            .unwrap();
        assert_eq!(
            def.ancestry().collect::<Vec<_>>(),
            vec!["HomePageController", "PageController", "Page", BASE_CLASS]
        );
        assert_eq!(def.name(), "HomePageController");
        assert_eq!(def.layers().last().unwrap().url_handlers().len(), 1);
    }

    #[test]
    fn allow_lists_merge_with_derived_overrides() {
        let def = Def::builder("Base")
            .allow_permission("edit", "CMS_ACCESS")
            .allow("view")
            .class("Derived")
            .allow("edit")
            .build()
            .unwrap();

        let merged = def.allowed_actions(None).unwrap();
        assert_eq!(merged.get("edit"), Some(&AllowEntry::Listed));
        assert_eq!(merged.get("VIEW"), Some(&AllowEntry::Listed));

        let own = def.allowed_actions(Some("Base")).unwrap();
        assert_eq!(
            own.get("edit"),
            Some(&AllowEntry::Keyed(Access::Permission("CMS_ACCESS".into())))
        );
        assert!(def.allowed_actions(Some(BASE_CLASS)).is_none());
    }

    #[test]
    fn undeclared_allow_lists_are_none_and_empty_ones_are_some() {
        let undeclared = Def::builder("A").build().unwrap();
        assert!(undeclared.allowed_actions(None).is_none());

        let empty = Def::builder("A").allow_none().build().unwrap();
        assert!(empty.allowed_actions(None).unwrap().is_empty());
    }

    #[test]
    fn reserved_action_names_are_rejected() {
        let err = Def::builder("A")
            .action("Init", |_, _, _| Ok(Outcome::Empty))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedAction { .. }));
    }

    #[test]
    fn unknown_checks_are_rejected() {
        let err = Def::builder("A")
            .allow_if("edit", "canEdit")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCheck { ref check, .. } if check == "canEdit"));
    }

    #[test]
    fn invalid_rules_are_reported_at_build() {
        let err = Def::builder("A")
            .url_handler("$*/x", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn actions_resolve_case_insensitively_and_record_their_class() {
        let def = Def::builder("Base")
            .action("Show", |_, _, _| Ok(Outcome::Empty))
            .class("Derived")
            .build()
            .unwrap();
        let entry = def.action("show").unwrap();
        assert_eq!(entry.name(), "Show");
        assert_eq!(entry.defined_in(), "Base");
        assert!(def.has_action("SHOW"));
    }
}
