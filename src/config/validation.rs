use super::{ConfigError, EngineConfig};

/// Validate the full engine config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    validate_think_config(config)?;
    validate_snippet_config(config)?;
    validate_citation_config(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_think_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let think = &config.think;
    if think.tool_name.trim().is_empty() {
        return Err(validation_err("think.tool_name cannot be empty"));
    }
    if think.json_prefixes.is_empty() {
        return Err(validation_err("think.json_prefixes cannot be empty"));
    }
    for prefix in &think.json_prefixes {
        if prefix.is_empty() {
            return Err(validation_err("think.json_prefixes contains an empty prefix"));
        }
    }
    Ok(())
}

fn validate_snippet_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let score = config.snippet.fuzzy_min_score;
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(validation_err(format!(
            "snippet.fuzzy_min_score must be within 0..=100, got {score}"
        )));
    }
    Ok(())
}

fn validate_citation_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if let Some(stop) = config.citations.stop_pattern.as_deref() {
        if stop.is_empty() {
            return Err(validation_err(
                "citations.stop_pattern cannot be empty when set",
            ));
        }
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];

fn validate_log_level(config: &EngineConfig) -> Result<(), ConfigError> {
    let level = config.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "log_level '{}' is invalid. Must be one of: {}",
            config.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
