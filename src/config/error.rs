//! Configuration error types.

use std::fmt;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// Environment variable could not be parsed into its type.
    Parse {
        key: String,
        value: String,
        error: String,
    },
    /// Environment variable parsed but is out of range.
    Invalid { key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { key, value, error } => {
                write!(f, "failed to parse {}='{}': {}", key, value, error)
            }
            ConfigError::Invalid { key, message } => {
                write!(f, "invalid value for {}: {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Parse {
            key: "MAX_BODY_SIZE".into(),
            value: "lots".into(),
            error: "invalid digit found in string".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse MAX_BODY_SIZE='lots': invalid digit found in string"
        );

        let err = ConfigError::Invalid {
            key: "MAX_BODY_SIZE".into(),
            message: "must be greater than zero".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for MAX_BODY_SIZE: must be greater than zero"
        );
    }
}
