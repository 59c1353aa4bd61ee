//! Bot configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;
use crate::ledger::UserId;
use crate::policy::PolicyConfig;
use crate::transport::{ChatId, TelegramConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub transport: TelegramConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot API token
    #[serde(default)]
    pub token: String,

    /// The one identity allowed to use admin commands
    #[serde(default)]
    pub admin_id: UserId,

    /// Distribution group that receives forwarded media and notices
    #[serde(default)]
    pub group_id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bot_data.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Pause between two recipients; 0 sends back to back
    #[serde(default = "default_broadcast_delay")]
    pub delay_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_broadcast_delay(),
        }
    }
}

fn default_broadcast_delay() -> u64 { 50 }

impl BroadcastConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.token.trim().is_empty() {
            return Err(ConfigError::Invalid("bot.token must be set".to_string()));
        }
        if self.policy.long_cooldown_days <= 0 {
            return Err(ConfigError::Invalid(
                "policy.long_cooldown_days must be positive".to_string(),
            ));
        }
        if self.policy.daily_short_target == 0 {
            return Err(ConfigError::Invalid(
                "policy.daily_short_target must be positive".to_string(),
            ));
        }
        if self.policy.short_points == 0 || self.policy.long_points == 0 {
            return Err(ConfigError::Invalid(
                "policy point values must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.db_path, PathBuf::from("bot_data.db"));
        assert_eq!(config.broadcast.delay(), Duration::from_millis(50));
        assert_eq!(config.policy.long_cooldown_days, 3);
        assert_eq!(config.transport.api_base_url, "https://api.telegram.org");
    }

    #[test]
    fn test_validate_rejects_missing_token() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.bot.token = "123:abc".to_string();
        assert!(config.validate().is_ok());

        config.policy.daily_short_target = 0;
        assert!(config.validate().is_err());

        config.policy.daily_short_target = 3;
        config.policy.long_cooldown_days = 0;
        assert!(config.validate().is_err());

        config.policy.long_cooldown_days = 3;
        config.policy.long_points = 0;
        assert!(config.validate().is_err());
    }
}
