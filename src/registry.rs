//! Routable handler registry.
//!
//! Built once at startup: every handler class that a route target or a
//! `$Controller` variable may name is registered here together with a
//! factory producing a fresh instance per request. Name lookups are
//! case-insensitive; the registered spelling is kept for display.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::controller::Controller;
use crate::dispatcher::{Handler, HandlerDefinition, RequestHandler};

/// Factory producing a fresh handler instance.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn RequestHandler> + Send + Sync>;

/// Names that a `$Controller` rule variable may resolve to.
pub trait RoutableNames {
    fn is_routable(&self, name: &str) -> bool;
}

struct Entry {
    name: String,
    factory: HandlerFactory,
}

/// Registry of routable handler classes.
#[derive(Default)]
pub struct ControllerRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ControllerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn RequestHandler> + Send + Sync + 'static,
    {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            warn!(handler = %name, "Replacing existing handler registration");
        } else {
            debug!(handler = %name, "Registering handler");
        }
        self.entries.insert(
            key,
            Entry {
                name,
                factory: Arc::new(factory),
            },
        );
    }

    /// Register a plain handler built from `definition`, with fresh state per request.
    pub fn register_handler<S, F>(&mut self, definition: Arc<HandlerDefinition<Handler<S>>>, state: F)
    where
        S: 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let name = definition.name().to_string();
        self.register(name, move || {
            Box::new(Handler::new(Arc::clone(&definition), state())) as Box<dyn RequestHandler>
        });
    }

    /// Register a controller built from `definition`, with fresh state per request.
    pub fn register_controller<S, F>(
        &mut self,
        definition: Arc<HandlerDefinition<Controller<S>>>,
        state: F,
    ) where
        S: 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let name = definition.name().to_string();
        self.register(name, move || {
            Box::new(Controller::new(Arc::clone(&definition), state())) as Box<dyn RequestHandler>
        });
    }

    /// Instantiate the handler registered under `name`.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn RequestHandler>> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| (entry.factory)())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names in their registered spelling, sorted case-insensitively
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl RoutableNames for ControllerRegistry {
    fn is_routable(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Plain name sets, used when no instances are needed (route introspection).
impl RoutableNames for BTreeSet<String> {
    fn is_routable(&self, name: &str) -> bool {
        self.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let def = HandlerDefinition::<Handler<()>>::builder("HelpController")
            .build()
            .unwrap();
        let mut registry = ControllerRegistry::new();
        registry.register_handler(def, || ());

        assert!(registry.is_routable("helpcontroller"));
        assert!(registry.create("HELPCONTROLLER").is_some());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["HelpController"]);
        assert!(!registry.is_routable("Missing"));
    }

    #[test]
    fn name_sets_are_routable_names() {
        let names: BTreeSet<String> = ["Admin".to_string()].into_iter().collect();
        assert!(names.is_routable("admin"));
        assert!(!names.is_routable("Page"));
    }
}
