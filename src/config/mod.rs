//! Configuration module.
//!
//! Configuration is loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use httputil::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Body limit: {}", config.service.max_body_size);
//! ```

mod error;
mod logging;
mod parse;
mod service;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{env_bool, env_duration, env_opt, env_or, env_parse, parse_duration};
pub use parse::{EnvSource, ProcessEnv};
pub use service::{ServiceConfig, DEFAULT_MAX_BODY_SIZE};

/// Complete configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Request limits for the hyper adapter.
    pub service: ServiceConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Load configuration from any variable source.
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            service: ServiceConfig::from_source(env)?,
            logging: LoggingConfig::from_source(env)?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Service: {}", self.logging.service_name);
        info!("  Max body size: {} bytes", self.service.max_body_size);

        match self.service.request_timeout {
            Some(timeout) => info!("  Request timeout: {}s", timeout.as_secs()),
            None => info!("  Request timeout: disabled"),
        }

        if self.service.access_log {
            info!("  Access log: enabled");
        }

        info!("  Log filter: {}", self.logging.filter);
    }
}
