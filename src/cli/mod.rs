//! # CLI Module
//!
//! Route table introspection from the command line.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print every rule in evaluation order:
//!
//! ```bash
//! director routes --config routes.yaml
//! ```
//!
//! ### `resolve`
//!
//! Show which rule a URL hits, the handler it reaches and its bindings,
//! without running any handler:
//!
//! ```bash
//! director resolve --config routes.yaml --method POST /admin/help/edit
//! ```
//!
//! `$Controller` rules resolve against the config's `controllers` list
//! plus every static target name.

mod commands;


pub use commands::{resolve_report, run_cli, Cli, Commands};
