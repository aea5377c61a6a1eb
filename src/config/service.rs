//! Per-request limits for the hyper adapter.

use std::time::Duration;

use super::parse::{env_bool, env_duration, env_parse, EnvSource};
use super::ConfigError;

/// Default request body limit (10 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Limits applied to every request before the handler runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Largest accepted request body, in bytes (MAX_BODY_SIZE).
    pub max_body_size: usize,
    /// Deadline given to each request context (REQUEST_TIMEOUT, "off" disables).
    pub request_timeout: Option<Duration>,
    /// Emit one access log line per request (ACCESS_LOG).
    pub access_log: bool,
}

impl ServiceConfig {
    /// Load configuration from a variable source.
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let max_body_size = env_parse(env, "MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE)?;
        if max_body_size == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_BODY_SIZE".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            max_body_size,
            request_timeout: env_duration(env, "REQUEST_TIMEOUT", "off")?,
            access_log: env_bool(env, "ACCESS_LOG", false),
        })
    }

    /// Set the body limit.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Enable or disable access logging.
    pub fn with_access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_timeout: None,
            access_log: false,
        }
    }
}
