//! # Router Module
//!
//! URL rule matching and the global route table.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Parsing rule strings such as `"POST admin/$Action!//$ID"` into [`Rule`]s
//! - Matching one rule against the remaining path of a request, binding
//!   variables and shifting the consumed segments
//! - Picking the first matching rule of the ordered [`RouteTable`] and handing
//!   the request to the named handler, or redirecting
//!
//! ## Rule syntax
//!
//! ```text
//! ["METHOD "] segment ("/" segment)*
//! segment := literal | $Name | $Name! | $* | $@
//! ```
//!
//! - `$Name!` must be populated for the rule to match
//! - `$*` / `$@` capture the remainder and must be last
//! - one `//` marks the shift boundary; segments after it are parsed but stay
//!   on the path for the next handler
//! - `$Controller` only matches a registered handler name
//!
//! ## Example
//!
//! ```rust
//! use director::registry::ControllerRegistry;
//! use director::request::HttpRequest;
//! use director::router::{MatchOutcome, Rule};
//!
//! let rule = Rule::parse("$Action//$ID/$OtherID").unwrap();
//! let mut req = HttpRequest::get("show/42");
//!
//! let outcome = rule.matches(&mut req, true, &ControllerRegistry::new());
//! let MatchOutcome::Matched(bindings) = outcome else { panic!("expected bindings") };
//! assert_eq!(bindings.get("Action"), Some("show"));
//! assert_eq!(bindings.get("ID"), Some("42"));
//! assert_eq!(req.remaining(), "42");
//! assert_eq!(req.unshifted_but_parsed(), 2);
//! ```

mod core;
mod params;
mod rule;

pub use self::core::{
    Route, RouteResolution, RouteTable, RouteTarget, DEFAULT_REDIRECT_STATUS, NO_RULE_MATCHED,
    POP_TOKENISER_KEY,
};
pub use params::{Bindings, ParamVec, MAX_INLINE_PARAMS};
pub use rule::{MatchOutcome, Rule, Token, CONTROLLER_VAR};
