use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::RoutesConfig;
use crate::error::ConfigError;

/// Supported configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Format from a file extension (`yaml`, `yml`, `json`, `toml`).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse route configuration text.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<RoutesConfig, ConfigError> {
    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).context("invalid YAML route config")?,
        ConfigFormat::Json => serde_json::from_str(content).context("invalid JSON route config")?,
        ConfigFormat::Toml => toml::from_str(content).context("invalid TOML route config")?,
    };
    Ok(config)
}

/// Load route configuration, picking the parser by file extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<RoutesConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = parse_config(&content, format)?;
    info!(
        path = %path.display(),
        format = ?format,
        rules_count = config.rules.len(),
        "Route config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;

    #[test]
    fn yaml_targets_parse_in_order() {
        let config = parse_config(
            r#"
rules:
  - pattern: "admin/help"
    target: HelpController
  - pattern: "pages//$Action"
    target:
      Controller: PageController
      Section: pages
      _PopTokeniser: 1
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.rules.len(), 2);
        assert_eq!(
            config.rules[0].target,
            TargetConfig::Name("HelpController".into())
        );
        let TargetConfig::Options(options) = &config.rules[1].target else {
            panic!("expected options");
        };
        assert_eq!(options.controller.as_deref(), Some("PageController"));
        assert_eq!(options.pop_tokeniser, Some(1));
        assert_eq!(options.defaults["Section"], serde_json::json!("pages"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = ConfigFormat::from_path(Path::new("routes.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
