use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use http::Method;

use crate::config::{load_config, RoutesConfig, TargetConfig};
use crate::request::HttpRequest;
use crate::router::{RouteResolution, RouteTable};

/// Command-line interface for inspecting route configuration
#[derive(Parser, Debug)]
#[command(name = "director")]
#[command(about = "Inspect and test director route tables", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the route table in evaluation order
    Routes {
        /// Route config file (YAML, JSON or TOML)
        #[arg(short, long, env = "DIRECTOR_ROUTES")]
        config: PathBuf,
    },
    /// Show where a URL would be routed
    Resolve {
        #[arg(short, long, env = "DIRECTOR_ROUTES")]
        config: PathBuf,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request URL, e.g. `/admin/help?x=1`
        url: String,
    },
}

/// Run a parsed command, writing its report to stdout.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Routes { config } => {
            let config = load_config(&config)?;
            let table = RouteTable::from_config(&config)?;
            for line in table.dump() {
                println!("{line}");
            }
        }
        Commands::Resolve {
            config,
            method,
            url,
        } => {
            let config = load_config(&config)?;
            println!("{}", resolve_report(&config, &method, &url)?);
        }
    }
    Ok(())
}

/// Describe how `url` resolves against `config` without running a handler.
pub fn resolve_report(config: &RoutesConfig, method: &str, url: &str) -> anyhow::Result<String> {
    let table = RouteTable::from_config(config)?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{method}'"))?;
    let names = routable_names(config);
    let mut req = HttpRequest::new(method.clone(), url);

    let report = match table.resolve(&mut req, &names, table.base_url()) {
        RouteResolution::NotFound => format!("{method} {url} → no rule matched (404)"),
        RouteResolution::Redirect {
            rule,
            location,
            status,
        } => format!("{method} {url} → [{rule}] redirect {status} {location}"),
        RouteResolution::Dispatch {
            rule,
            controller,
            arguments,
        } => {
            let params = arguments
                .iter()
                .map(|(k, v)| format!("{k}={}", v.unwrap_or("")))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "{method} {url} → [{rule}] {controller} | params: {params} | remaining: /{}",
                req.remaining()
            )
        }
    };
    Ok(report)
}

/// Names a `$Controller` variable may resolve to: declared controllers plus
/// every static target.
fn routable_names(config: &RoutesConfig) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = config.controllers.iter().cloned().collect();
    for rule in &config.rules {
        let name = match &rule.target {
            TargetConfig::Name(name) if !name.starts_with("->") => Some(name.as_str()),
            TargetConfig::Options(options) => options.controller.as_deref(),
            TargetConfig::Name(_) => None,
        };
        if let Some(name) = name.filter(|n| !n.starts_with('$')) {
            names.insert(name.to_string());
        }
    }
    names
}
