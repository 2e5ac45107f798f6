//! stratus.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StratusConfig {
    pub cloud: CloudConfig,
    pub retry: RetryConfig,
    pub poll: PollConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub region: String,
    pub account_id: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
        }
    }
}

/// Budget for retrying calls that race the provider's read-after-write lag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub service_interval_ms: u64,
    /// 0 means poll until the classifier reaches a terminal state.
    pub max_checks: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            service_interval_ms: 15_000,
            max_checks: 0,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.service_interval_ms)
    }

    pub fn max_checks(&self) -> Option<u32> {
        (self.max_checks > 0).then_some(self.max_checks)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub default_cidr: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_cidr: "10.0.0.0/24".to_string(),
        }
    }
}

impl StratusConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(?path, "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: StratusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            anyhow::bail!("retry.multiplier must be >= 1.0, got {}", self.retry.multiplier);
        }
        if self.poll.service_interval_ms == 0 {
            anyhow::bail!("poll.service_interval_ms must be positive");
        }
        Ok(())
    }
}
