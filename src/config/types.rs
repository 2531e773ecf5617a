use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Route configuration file contents.
///
/// ```yaml
/// base_url: https://example.com/
/// controllers: [PageController]
/// rules:
///   - pattern: "admin/help"
///     target: HelpController
///   - pattern: "old-home"
///     target: "->home"
///   - pattern: "pages//$Action"
///     target:
///       Controller: PageController
///       Section: pages
///       _PopTokeniser: 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Rules in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    /// Extra routable names (for `$Controller` rules) known without a registry
    #[serde(default)]
    pub controllers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    pub target: TargetConfig,
}

/// A rule target: `"Name"`, `"->destination"`, or an option map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetConfig {
    Name(String),
    Options(TargetOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetOptions {
    #[serde(rename = "Controller", default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    #[serde(rename = "Redirect", default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,

    #[serde(
        rename = "RedirectStatus",
        alias = "redirect_status",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_status: Option<u16>,

    #[serde(rename = "_PopTokeniser", default, skip_serializing_if = "Option::is_none")]
    pub pop_tokeniser: Option<usize>,

    /// Static default bindings
    #[serde(flatten)]
    pub defaults: BTreeMap<String, serde_json::Value>,
}
