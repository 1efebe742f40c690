//! Configuration management with validation and defaults
//!
//! Every section has a `Default`, so an empty TOML file (or none at all) yields
//! the same economy the bot has always run with.

use crate::errors::{ConfigurationError, EconomyResult};
use crate::games::rarity::RarityTier;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Longest accepted duel window (one day)
pub const MAX_CHALLENGE_TIMEOUT_SECS: u64 = 86_400;
/// Upper bound for fishing bite delays and the catch window
pub const MAX_FISHING_SECS: u64 = 3_600;
/// Longest accepted daily-claim cooldown (one year)
pub const MAX_DAILY_COOLDOWN_HOURS: u64 = 8_760;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub ledger: LedgerConfig,
    pub games: GamesConfig,
    pub challenge: ChallengeConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

/// Ledger rewards
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub daily_reward: u64,
    pub daily_cooldown_hours: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_reward: 100,
            daily_cooldown_hours: 24,
        }
    }
}

/// Single-shot game tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GamesConfig {
    /// Credited multiple of the bet on an exact roulette hit
    pub roulette_multiplier: u64,
    pub fishing_bite_min_secs: u64,
    pub fishing_bite_max_secs: u64,
    pub fishing_catch_window_secs: u64,
    /// Replaces the built-in rarity table when present
    pub rarity: Option<Vec<RarityTierConfig>>,
}

impl Default for GamesConfig {
    fn default() -> Self {
        Self {
            roulette_multiplier: 36,
            fishing_bite_min_secs: 2,
            fishing_bite_max_secs: 4,
            fishing_catch_window_secs: 10,
            rarity: None,
        }
    }
}

/// One row of a rarity table override
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RarityTierConfig {
    pub tier: RarityTier,
    pub weight: u32,
    pub items: Vec<String>,
}

/// Duel timing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    pub timeout_secs: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Where account state lives
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub data_file: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Json,
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Json,
            data_file: "data.json".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

impl EconomyConfig {
    /// In-memory configuration used by tests and throwaway sessions
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackendKind::Memory,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ledger.daily_reward == 0 {
            return Err(invalid("ledger.daily_reward", "0", "Daily reward must be > 0"));
        }

        if self.challenge.timeout_secs == 0 {
            return Err(invalid("challenge.timeout_secs", "0", "Challenge timeout must be > 0"));
        }

        if self.challenge.timeout_secs > MAX_CHALLENGE_TIMEOUT_SECS {
            return Err(invalid(
                "challenge.timeout_secs",
                &self.challenge.timeout_secs.to_string(),
                "Challenge timeout must be at most one day",
            ));
        }

        if self.ledger.daily_cooldown_hours > MAX_DAILY_COOLDOWN_HOURS {
            return Err(invalid(
                "ledger.daily_cooldown_hours",
                &self.ledger.daily_cooldown_hours.to_string(),
                "Cooldown must be at most one year",
            ));
        }

        if self.games.roulette_multiplier == 0 {
            return Err(invalid("games.roulette_multiplier", "0", "Multiplier must be > 0"));
        }

        if self.games.fishing_bite_min_secs > self.games.fishing_bite_max_secs {
            return Err(invalid(
                "games.fishing_bite_min_secs",
                &self.games.fishing_bite_min_secs.to_string(),
                "Minimum bite delay exceeds maximum",
            ));
        }

        for (field, secs) in [
            ("games.fishing_bite_max_secs", self.games.fishing_bite_max_secs),
            ("games.fishing_catch_window_secs", self.games.fishing_catch_window_secs),
        ] {
            if secs > MAX_FISHING_SECS {
                let reason = "Fishing delays must be at most one hour";
                return Err(invalid(field, &secs.to_string(), reason));
            }
        }

        let json = self.storage.backend == StorageBackendKind::Json;
        if json && self.storage.data_file.trim().is_empty() {
            return Err(invalid("storage.data_file", "", "JSON backend needs a data file"));
        }

        if let Some(tiers) = &self.games.rarity {
            let total: u32 = tiers.iter().map(|t| t.weight).sum();
            if total != 100 {
                return Err(ConfigurationError::RarityWeights { total });
            }
            if let Some(empty) = tiers.iter().find(|t| t.weight > 0 && t.items.is_empty()) {
                return Err(ConfigurationError::EmptyTier(empty.tier.to_string()));
            }
        }

        Ok(())
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs(self.challenge.timeout_secs)
    }

    pub fn daily_cooldown(&self) -> Result<chrono::Duration, ConfigurationError> {
        let hours = self.ledger.daily_cooldown_hours;
        i64::try_from(hours)
            .ok()
            .filter(|h| *h <= MAX_DAILY_COOLDOWN_HOURS as i64)
            .map(chrono::Duration::hours)
            .ok_or_else(|| {
                invalid(
                    "ledger.daily_cooldown_hours",
                    &hours.to_string(),
                    "Cooldown must be at most one year",
                )
            })
    }
}

pub(crate) fn invalid(field: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> EconomyResult<EconomyConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => EconomyConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document into a configuration
    pub fn from_toml_str(content: &str) -> Result<EconomyConfig, ConfigurationError> {
        toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn load_from_file(path: &str) -> Result<EconomyConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    fn apply_env_overrides(config: &mut EconomyConfig) -> Result<(), ConfigurationError> {
        if let Ok(data_file) = env::var("COINPURSE_DATA_FILE") {
            config.storage.data_file = data_file;
        }

        if let Ok(timeout) = env::var("COINPURSE_CHALLENGE_TIMEOUT_SECS") {
            config.challenge.timeout_secs = timeout.parse().map_err(|_| {
                invalid("COINPURSE_CHALLENGE_TIMEOUT_SECS", &timeout, "Invalid timeout value")
            })?;
        }

        if let Ok(reward) = env::var("COINPURSE_DAILY_REWARD") {
            config.ledger.daily_reward = reward
                .parse()
                .map_err(|_| invalid("COINPURSE_DAILY_REWARD", &reward, "Invalid reward amount"))?;
        }

        if let Ok(level) = env::var("COINPURSE_LOG_LEVEL") {
            config.monitoring.log_level = level
                .parse()
                .map_err(|reason: String| invalid("COINPURSE_LOG_LEVEL", &level, &reason))?;
        }

        Ok(())
    }
}
