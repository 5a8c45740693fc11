//! Configuration management for Pricegate.
//!
//! Values are layered: built-in defaults, then an optional YAML/TOML file,
//! then `PRICEGATE__<SECTION>__<KEY>` environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ServerError};
use crate::ratelimit::{QuotaPolicy, SweeperConfig};

/// Main configuration for the Pricegate service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricegateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// UDP address to listen on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Optional YAML price catalog replacing the built-in one
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            catalog_path: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8888))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests admitted per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests_per_period: u32,

    /// Idle time in seconds after which a client's window starts over
    #[serde(default = "default_rate_limit_period")]
    pub rate_limit_period_secs: u64,

    /// Idle time in seconds after which a client is forgotten
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,

    /// Seconds between eviction sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_requests_per_period: default_max_requests(),
            rate_limit_period_secs: default_rate_limit_period(),
            inactivity_timeout_secs: default_inactivity_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_requests() -> u32 {
    10
}

fn default_rate_limit_period() -> u64 {
    3600
}

fn default_inactivity_timeout() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

impl RateLimitingConfig {
    /// Quota policy for the tracker.
    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy::new(
            self.max_requests_per_period,
            Duration::from_secs(self.rate_limit_period_secs),
        )
    }

    /// Timing for the eviction sweeper.
    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(self.sweep_interval_secs),
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_secs),
        }
    }
}

impl PricegateConfig {
    /// Load configuration from defaults, an optional file, and the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!(path = %path, "Loading configuration file");
            builder = builder.add_source(File::with_name(path));
        }

        let config: PricegateConfig = builder
            .add_source(
                Environment::with_prefix("PRICEGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PricegateConfig =
            serde_yaml::from_str(yaml).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.rate_limiting;
        if limits.max_requests_per_period == 0 {
            return Err(ServerError::Config(
                "max_requests_per_period must be greater than 0".to_string(),
            ));
        }
        if limits.rate_limit_period_secs == 0 {
            return Err(ServerError::Config(
                "rate_limit_period_secs must be greater than 0".to_string(),
            ));
        }
        if limits.inactivity_timeout_secs == 0 {
            return Err(ServerError::Config(
                "inactivity_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if limits.sweep_interval_secs == 0 {
            return Err(ServerError::Config(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
