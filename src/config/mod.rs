pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// How the streaming citation processor renders markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CitationMode {
    /// Replace `[n]` with `[[n]](link)` and report newly cited documents.
    #[default]
    Hyperlink,
    /// Leave markers untouched; still track which citations were seen.
    KeepMarkers,
    /// Strip markers from the output; still track which citations were seen.
    Remove,
}

impl fmt::Display for CitationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationMode::Hyperlink => write!(f, "hyperlink"),
            CitationMode::KeepMarkers => write!(f, "keep_markers"),
            CitationMode::Remove => write!(f, "remove"),
        }
    }
}

/// Settings for the think-tool redirector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkRedirectorConfig {
    #[serde(default = "default_think_tool_name")]
    pub tool_name: String,
    #[serde(default = "default_json_prefixes")]
    pub json_prefixes: Vec<String>,
}

pub const DEFAULT_THINK_TOOL_NAME: &str = "think_tool";
pub const JSON_PREFIX_WITH_SPACE: &str = r#"{"reasoning": ""#;
pub const JSON_PREFIX_NO_SPACE: &str = r#"{"reasoning":""#;

fn default_think_tool_name() -> String {
    DEFAULT_THINK_TOOL_NAME.to_string()
}
fn default_json_prefixes() -> Vec<String> {
    vec![
        JSON_PREFIX_WITH_SPACE.to_string(),
        JSON_PREFIX_NO_SPACE.to_string(),
    ]
}

impl Default for ThinkRedirectorConfig {
    fn default() -> Self {
        Self {
            tool_name: default_think_tool_name(),
            json_prefixes: default_json_prefixes(),
        }
    }
}

/// Settings for the snippet locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetConfig {
    /// Minimum partial-ratio score (0..=100) for the fuzzy fallback.
    #[serde(default = "default_fuzzy_min_score")]
    pub fuzzy_min_score: f64,
}

fn default_fuzzy_min_score() -> f64 {
    80.0
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_score: default_fuzzy_min_score(),
        }
    }
}

/// Settings for the streaming citation processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CitationConfig {
    #[serde(default)]
    pub mode: CitationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_pattern: Option<String>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub think: ThinkRedirectorConfig,
    #[serde(default)]
    pub snippet: SnippetConfig,
    #[serde(default)]
    pub citations: CitationConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            think: ThinkRedirectorConfig::default(),
            snippet: SnippetConfig::default(),
            citations: CitationConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}
