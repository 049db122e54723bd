use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSettings {
    pub primary_throttle: ThrottleConfig,
    pub secondary_throttle: ThrottleConfig,
    /// Upper bound on simultaneous secondary requests during a batch
    /// refresh. Unset means one request per controller at once.
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    pub rest: RestSettings,
}

/// Token budget for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub epoch_interval_secs: u64,
    pub tokens_per_epoch: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl ThrottleConfig {
    pub fn new(epoch_interval: Duration, tokens_per_epoch: u32) -> Self {
        Self {
            epoch_interval_secs: epoch_interval.as_secs(),
            tokens_per_epoch,
        }
    }

    /// Five calls per half hour.
    pub fn primary_default() -> Self {
        Self::new(Duration::from_secs(30 * 60), 5)
    }

    /// Two calls per minute; grows with the number of controllers.
    pub fn secondary_default() -> Self {
        Self::new(Duration::from_secs(60), 2)
    }

    pub fn epoch_interval(&self) -> Duration {
        Duration::from_secs(self.epoch_interval_secs)
    }
}

impl HybridSettings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = Path::new("config");

        let builder = Config::builder()
            // Start with built-in budgets
            .add_source(Config::try_from(&HybridSettings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // HYDRAWISE_SECONDARY_THROTTLE__TOKENS_PER_EPOCH=4 and friends
            .add_source(
                Environment::with_prefix("HYDRAWISE")
                    .prefix_separator("_")
                    .separator("__"),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            primary_throttle: ThrottleConfig::primary_default(),
            secondary_throttle: ThrottleConfig::secondary_default(),
            concurrency_limit: None,
            rest: RestSettings {
                base_url: "https://api.hydrawise.com/api/v1/".to_string(),
                api_key: None,
                timeout_secs: 10,
            },
        }
    }
}
