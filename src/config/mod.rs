//! # Config Module
//!
//! Route configuration files: an ordered list of rules and their targets,
//! loaded from YAML, JSON or TOML and turned into a
//! [`RouteTable`](crate::router::RouteTable) with
//! [`RouteTable::from_config`](crate::router::RouteTable::from_config).

mod load;
mod types;

pub use load::{load_config, parse_config, ConfigFormat};
pub use types::{RoutesConfig, RuleConfig, TargetConfig, TargetOptions};
