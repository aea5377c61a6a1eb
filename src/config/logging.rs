//! Logging configuration.

use super::parse::{env_or, EnvSource};
use super::ConfigError;

/// Output format for log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable tracing output.
    Text,
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name for structured logging.
    pub service_name: String,
    /// Output format (from LOG_FORMAT).
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Load configuration from a variable source.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: httputil=debug,hyper=warn
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let format = match env_or(env, "LOG_FORMAT", "json").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT".into(),
                    message: format!("expected json or text, got '{}'", other),
                })
            }
        };

        Ok(Self {
            filter: Self::resolve_log_filter(env),
            service_name: env_or(env, "SERVICE_NAME", "httputil"),
            format,
        })
    }

    /// Resolve log filter.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default (info)
    fn resolve_log_filter(env: &impl EnvSource) -> String {
        if let Some(level) = env.var("LOG_LEVEL") {
            let level = level.to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {
                    return format!("httputil={}", level);
                }
                _ => {
                    // Subscriber is not installed yet
                    eprintln!(
                        "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                        level
                    );
                }
            }
        }

        if let Some(filter) = env.var("RUST_LOG") {
            return filter;
        }

        "httputil=info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "httputil=info".to_string(),
            service_name: "httputil".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_level_priority() {
        let env: HashMap<&str, &str> = HashMap::new();
        assert_eq!(LoggingConfig::resolve_log_filter(&env), "httputil=info");

        let env = HashMap::from([("RUST_LOG", "httputil=warn,hyper=debug")]);
        assert_eq!(
            LoggingConfig::resolve_log_filter(&env),
            "httputil=warn,hyper=debug"
        );

        let env = HashMap::from([("RUST_LOG", "httputil=warn"), ("LOG_LEVEL", "DEBUG")]);
        assert_eq!(LoggingConfig::resolve_log_filter(&env), "httputil=debug");

        let env = HashMap::from([("RUST_LOG", "httputil=warn"), ("LOG_LEVEL", "loud")]);
        assert_eq!(LoggingConfig::resolve_log_filter(&env), "httputil=warn");
    }

    #[test]
    fn test_log_format() {
        let env = HashMap::from([("LOG_FORMAT", "Text"), ("SERVICE_NAME", "users")]);
        let config = LoggingConfig::from_source(&env).unwrap();
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.service_name, "users");

        let env = HashMap::from([("LOG_FORMAT", "xml")]);
        assert!(LoggingConfig::from_source(&env).is_err());
    }
}
