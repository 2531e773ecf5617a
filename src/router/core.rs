//! Route table core - the global, ordered rule list.
//!
//! Rules are tried strictly in declaration order and the first match wins.
//! A match either yields a redirect or names the handler class that takes
//! over the rest of the path.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use super::params::Bindings;
use super::rule::{Rule, CONTROLLER_VAR};
use crate::config::{RoutesConfig, TargetConfig};
use crate::dispatcher::DispatchContext;
use crate::error::{ConfigError, DispatchResult};
use crate::registry::{ControllerRegistry, RoutableNames};
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// `$Name` references inside a redirect destination.
static INTERPOLATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("static interpolation regex"));

/// Static option that shifts extra segments after a match.
pub const POP_TOKENISER_KEY: &str = "_PopTokeniser";

/// Default redirect status.
pub const DEFAULT_REDIRECT_STATUS: u16 = 302;

/// Message of the 404 produced when no rule matches.
pub const NO_RULE_MATCHED: &str = "No URL rule was matched";

/// What a matched rule leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Redirect to `destination` (may reference bindings as `$Name`)
    Redirect { destination: String, status: u16 },
    /// Hand the request to a registered handler
    Controller {
        name: String,
        defaults: Bindings,
        pop_tokens: usize,
    },
}

impl RouteTarget {
    /// Parse the short string form: `"->destination"` or a handler name.
    pub fn parse(target: &str) -> Result<Self, ConfigError> {
        let target = target.trim();
        if let Some(destination) = target.strip_prefix("->") {
            return Ok(RouteTarget::redirect(destination.trim()));
        }
        if target.is_empty() {
            return Err(ConfigError::InvalidTarget {
                rule: String::new(),
                reason: "empty target".to_string(),
            });
        }
        Ok(RouteTarget::controller(target))
    }

    #[must_use]
    pub fn controller(name: impl Into<String>) -> Self {
        RouteTarget::Controller {
            name: name.into(),
            defaults: Bindings::new(),
            pop_tokens: 0,
        }
    }

    #[must_use]
    pub fn redirect(destination: impl Into<String>) -> Self {
        RouteTarget::Redirect {
            destination: destination.into(),
            status: DEFAULT_REDIRECT_STATUS,
        }
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Redirect {
                destination,
                status,
            } => write!(f, "-> {destination} ({status})"),
            RouteTarget::Controller {
                name,
                defaults,
                pop_tokens,
            } => {
                f.write_str(name)?;
                for (k, v) in defaults.iter() {
                    write!(f, " {k}={}", v.unwrap_or(""))?;
                }
                if *pop_tokens > 0 {
                    write!(f, " {POP_TOKENISER_KEY}={pop_tokens}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub rule: Rule,
    pub target: RouteTarget,
}

/// Outcome of resolving a request against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResolution {
    NotFound,
    Redirect {
        rule: String,
        location: String,
        status: u16,
    },
    Dispatch {
        rule: String,
        controller: String,
        /// Static defaults merged with the dynamic bindings
        arguments: Bindings,
    },
}

/// Ordered rule → target table. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    base_url: Option<String>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Parse errors are reported immediately.
    pub fn push(&mut self, pattern: &str, target: RouteTarget) -> Result<(), ConfigError> {
        let rule = Rule::parse(pattern)?;
        self.routes.push(Route { rule, target });
        Ok(())
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, pattern: &str, target: &str) -> Result<Self, ConfigError> {
        let target = RouteTarget::parse(target).map_err(|e| with_rule(e, pattern))?;
        self.push(pattern, target)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Build the table from a loaded configuration file.
    pub fn from_config(config: &RoutesConfig) -> Result<Self, ConfigError> {
        let mut table = RouteTable::new();
        table.base_url = config.base_url.clone();
        for rule in &config.rules {
            let target = target_from_config(&rule.pattern, &rule.target)?;
            table.push(&rule.pattern, target)?;
        }
        info!(
            routes_count = table.routes.len(),
            base_url = ?table.base_url,
            "Route table loaded"
        );
        Ok(table)
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// One line per rule in evaluation order.
    #[must_use]
    pub fn dump(&self) -> Vec<String> {
        self.routes
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{:>3}  {:<32} {}", i + 1, r.rule.source(), r.target))
            .collect()
    }

    /// Check that every static handler name is registered.
    ///
    /// Names starting with `$` are resolved from bindings at request time and
    /// are skipped.
    pub fn validate(&self, registry: &ControllerRegistry) -> Result<(), ConfigError> {
        for route in &self.routes {
            if let RouteTarget::Controller { name, .. } = &route.target {
                if !name.starts_with('$') && !registry.contains(name) {
                    return Err(ConfigError::UnknownController {
                        rule: route.rule.source().to_string(),
                        controller: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Find the first matching rule and work out where the request goes.
    ///
    /// Matching shifts the consumed segments off `req`, records the route's
    /// static defaults on it and pops any extra `_PopTokeniser` segments.
    pub fn resolve(
        &self,
        req: &mut HttpRequest,
        routable: &dyn RoutableNames,
        base_url: Option<&str>,
    ) -> RouteResolution {
        for route in &self.routes {
            let Some(bindings) = route.rule.matches(req, true, routable).into_bindings() else {
                continue;
            };

            match &route.target {
                RouteTarget::Redirect {
                    destination,
                    status,
                } => {
                    let location = absolute_url(&interpolate(destination, &bindings), base_url);
                    return RouteResolution::Redirect {
                        rule: route.rule.source().to_string(),
                        location,
                        status: *status,
                    };
                }
                RouteTarget::Controller {
                    name,
                    defaults,
                    pop_tokens,
                } => {
                    req.set_route_params(defaults.clone());
                    let mut arguments = defaults.clone();
                    arguments.merge(&bindings);
                    if *pop_tokens > 0 {
                        req.shift(*pop_tokens);
                    }
                    let controller = match arguments.get(CONTROLLER_VAR).filter(|c| !c.is_empty()) {
                        Some(dynamic) => dynamic.to_string(),
                        None => match name.strip_prefix('$') {
                            Some(var) => arguments.get(var).unwrap_or_default().to_string(),
                            None => name.clone(),
                        },
                    };
                    return RouteResolution::Dispatch {
                        rule: route.rule.source().to_string(),
                        controller,
                        arguments,
                    };
                }
            }
        }
        RouteResolution::NotFound
    }

    /// Route `req` and run it to a response.
    ///
    /// Response signals raised while dispatching are converted to their
    /// response here; faults propagate.
    pub fn handle_request(
        &self,
        req: &mut HttpRequest,
        cx: &mut DispatchContext,
    ) -> DispatchResult<HttpResponse> {
        let start = Instant::now();
        debug!(
            request_id = %req.request_id(),
            method = %req.method(),
            url = %req.url(),
            routes_count = self.routes.len(),
            "Route match attempt"
        );

        let base_url = self
            .base_url
            .clone()
            .or_else(|| cx.config().base_url.clone());
        let registry = Arc::clone(cx.registry());
        let resolution = self.resolve(req, registry.as_ref(), base_url.as_deref());

        match resolution {
            RouteResolution::NotFound => {
                warn!(
                    request_id = %req.request_id(),
                    method = %req.method(),
                    url = %req.url(),
                    duration_us = start.elapsed().as_micros(),
                    "No route matched"
                );
                Ok(HttpResponse::error(404, NO_RULE_MATCHED))
            }
            RouteResolution::Redirect {
                rule,
                location,
                status,
            } => {
                info!(
                    request_id = %req.request_id(),
                    rule = %rule,
                    location = %location,
                    status,
                    "Route redirect"
                );
                Ok(HttpResponse::redirect(location, status))
            }
            RouteResolution::Dispatch {
                rule, controller, ..
            } => {
                info!(
                    request_id = %req.request_id(),
                    rule = %rule,
                    controller = %controller,
                    remaining = %req.remaining(),
                    duration_us = start.elapsed().as_micros(),
                    "Route matched"
                );
                let mut handler = registry.create(&controller).ok_or_else(|| {
                    anyhow::anyhow!("route '{rule}' resolved to unregistered handler '{controller}'")
                })?;
                req.ensure_session();
                match handler.handle_request(req, cx) {
                    Ok(outcome) => Ok(outcome.into_response()),
                    Err(err) => err.recover(),
                }
            }
        }
    }
}

fn with_rule(err: ConfigError, pattern: &str) -> ConfigError {
    match err {
        ConfigError::InvalidTarget { reason, .. } => ConfigError::InvalidTarget {
            rule: pattern.to_string(),
            reason,
        },
        other => other,
    }
}

fn target_from_config(pattern: &str, target: &TargetConfig) -> Result<RouteTarget, ConfigError> {
    let options = match target {
        TargetConfig::Name(name) => {
            return RouteTarget::parse(name).map_err(|e| with_rule(e, pattern));
        }
        TargetConfig::Options(options) => options,
    };

    let invalid = |reason: &str| ConfigError::InvalidTarget {
        rule: pattern.to_string(),
        reason: reason.to_string(),
    };

    match (&options.controller, &options.redirect) {
        (Some(_), Some(_)) => Err(invalid("both Controller and Redirect are set")),
        (None, None) => Err(invalid("neither Controller nor Redirect is set")),
        (None, Some(destination)) => Ok(RouteTarget::Redirect {
            destination: destination.clone(),
            status: options.redirect_status.unwrap_or(DEFAULT_REDIRECT_STATUS),
        }),
        (Some(name), None) => {
            let defaults = options
                .defaults
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    };
                    (Arc::<str>::from(k.as_str()), value)
                })
                .fold(Bindings::new(), |mut acc, (k, v)| {
                    acc.set(k, v);
                    acc
                });
            Ok(RouteTarget::Controller {
                name: name.clone(),
                defaults,
                pop_tokens: options.pop_tokeniser.unwrap_or(0),
            })
        }
    }
}

/// Replace `$Name` references with bound values (unbound names become empty).
fn interpolate(destination: &str, bindings: &Bindings) -> String {
    INTERPOLATION_RE
        .replace_all(destination, |caps: &Captures<'_>| {
            bindings.get(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}

/// Resolve a relative destination against `base_url`.
fn absolute_url(destination: &str, base_url: Option<&str>) -> String {
    let Some(base) = base_url else {
        return destination.to_string();
    };
    if url::Url::parse(destination).is_ok() {
        return destination.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(destination)) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            warn!(base_url = %base, destination = %destination, error = %e, "Cannot absolutize redirect");
            destination.to_string()
        }
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn redirect_destinations_interpolate_bindings() {
        let bindings: Bindings = [("ID", "7")].into_iter().collect();
        assert_eq!(interpolate("/pages/$ID/$Missing", &bindings), "/pages/7/");
    }

    #[test]
    fn relative_destinations_join_base_url() {
        assert_eq!(
            absolute_url("admin/login", Some("https://example.com/site/")),
            "https://example.com/site/admin/login"
        );
        assert_eq!(
            absolute_url("https://other.org/", Some("https://example.com/")),
            "https://other.org/"
        );
        assert_eq!(absolute_url("/x", None), "/x");
    }

    #[test]
    fn string_targets_parse() {
        assert_eq!(
            RouteTarget::parse("->/new-home").unwrap(),
            RouteTarget::redirect("/new-home")
        );
        assert_eq!(
            RouteTarget::parse("AdminController").unwrap(),
            RouteTarget::controller("AdminController")
        );
        assert!(RouteTarget::parse("  ").is_err());
    }
}
