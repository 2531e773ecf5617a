#![allow(dead_code)]

use std::sync::Arc;

use director::dispatcher::{Handler, HandlerDefinition, Outcome};
use director::prelude::*;
use director::runtime_config::RuntimeConfig;
use parking_lot::Mutex;

/// Strict runtime switches: configuration faults fail the request.
pub fn strict() -> RuntimeConfig {
    RuntimeConfig::default().strict(true)
}

pub fn lenient() -> RuntimeConfig {
    RuntimeConfig::default().strict(false)
}

/// Application with strict switches, independent of the environment.
pub fn app(routes: RouteTable, registry: ControllerRegistry) -> HttpApplication {
    HttpApplication::new(routes, registry).with_config(strict())
}

/// Ordered record of events shared between hooks, middleware and asserts.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// `TeamHandler`: `$Action!` rule with a `members` action that echoes the
/// bindings it saw.
pub fn team_handler() -> Arc<HandlerDefinition<Handler<()>>> {
    HandlerDefinition::builder("TeamHandler")
        .url_handler("$Action!//$ID", "$Action")
        .action("members", |_h, req, _cx| {
            Ok(Outcome::Body(format!(
                "members id={}",
                req.param("ID").unwrap_or("-")
            )))
        })
        .allow("members")
        .build()
        .unwrap()
}
