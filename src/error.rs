use crate::config::ConfigError;

/// Crate-level error type.
///
/// The alignment components themselves never fail: they report "no match" or
/// "no change" through their return values. Only the surfaces around them
/// (configuration loading, the CLI harness) produce errors.
#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad error category, used by the CLI to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Usage,
    InvalidInput,
    Internal,
}

impl AlignError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            AlignError::Config(_) => ErrorCategory::Usage,
            AlignError::InvalidInput(_) | AlignError::Serialization(_) => {
                ErrorCategory::InvalidInput
            }
            AlignError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Usage => 2,
            ErrorCategory::InvalidInput => 65,
            ErrorCategory::Internal => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_usage_errors() {
        let err = AlignError::from(ConfigError::Validation("bad".into()));
        assert_eq!(err.category(), ErrorCategory::Usage);
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "Config error: Config validation error: bad");
    }

    #[test]
    fn malformed_json_is_invalid_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AlignError::from(json_err);
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert_eq!(err.exit_code(), 65);
    }
}
