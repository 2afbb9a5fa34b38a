//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config/ledger.toml.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::application::{LedgerOptions, ReferralOptions};
use crate::domain::wallet::{
    WalletSettings, MAX_GAS_LIMIT, MAX_SLIPPAGE_PCT, MIN_GAS_LIMIT, MIN_SLIPPAGE_PCT,
};

/// Main configuration structure matching config/ledger.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub wallets: WalletsSection,
    #[serde(default)]
    pub referrals: ReferralsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON document under `data_dir`
    File,
    /// Process-local, lost on exit
    Memory,
}

/// Storage configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// Directory holding users.json (supports ~)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl StorageSection {
    /// Data directory with environment override and tilde expansion.
    /// Checks LEDGER_DATA_DIR env var first, falls back to config value.
    pub fn get_data_dir(&self) -> PathBuf {
        let raw = std::env::var("LEDGER_DATA_DIR").unwrap_or_else(|_| self.data_dir.clone());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }
}

/// Position ledger configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    /// Create unknown users on their first trade instead of returning 404
    #[serde(default)]
    pub auto_create_users: bool,
    /// Re-runs of a read-modify-write after a version conflict
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
}

fn default_max_commit_retries() -> u32 {
    3
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            auto_create_users: false,
            max_commit_retries: default_max_commit_retries(),
        }
    }
}

/// Wallet defaults section
#[derive(Debug, Clone, Deserialize)]
pub struct WalletsSection {
    /// Slippage tolerance in percent used when a wallet is created without one
    pub default_slippage: Decimal,
    /// Gas limit used when a wallet is created without one
    pub default_gas_limit: u64,
}

impl Default for WalletsSection {
    fn default() -> Self {
        let settings = WalletSettings::default();
        Self {
            default_slippage: settings.slippage,
            default_gas_limit: settings.gas_limit,
        }
    }
}

/// Referral program section
#[derive(Debug, Clone, Deserialize)]
pub struct ReferralsSection {
    pub reward_per_referral: Decimal,
    pub code_length: usize,
    pub max_generation_attempts: u32,
}

impl Default for ReferralsSection {
    fn default() -> Self {
        let options = ReferralOptions::default();
        Self {
            reward_per_referral: options.reward_per_referral,
            code_length: options.code_length,
            max_generation_attempts: options.max_generation_attempts,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::File && self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir cannot be empty for the file backend".to_string(),
            ));
        }

        if self.ledger.max_commit_retries > 100 {
            return Err(ConfigError::ValidationError(format!(
                "max_commit_retries must be <= 100, got {}",
                self.ledger.max_commit_retries
            )));
        }

        if self.wallets.default_slippage < MIN_SLIPPAGE_PCT || self.wallets.default_slippage > MAX_SLIPPAGE_PCT {
            return Err(ConfigError::ValidationError(format!(
                "default_slippage must be 0.1-100, got {}",
                self.wallets.default_slippage
            )));
        }

        if !(MIN_GAS_LIMIT..=MAX_GAS_LIMIT).contains(&self.wallets.default_gas_limit) {
            return Err(ConfigError::ValidationError(format!(
                "default_gas_limit must be 21000-1000000, got {}",
                self.wallets.default_gas_limit
            )));
        }

        if self.referrals.reward_per_referral < Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "reward_per_referral must be >= 0, got {}",
                self.referrals.reward_per_referral
            )));
        }

        if !(4..=32).contains(&self.referrals.code_length) {
            return Err(ConfigError::ValidationError(format!(
                "code_length must be 4-32, got {}",
                self.referrals.code_length
            )));
        }

        if self.referrals.max_generation_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_generation_attempts must be > 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }
}

impl From<&Config> for LedgerOptions {
    fn from(config: &Config) -> Self {
        LedgerOptions {
            auto_create_users: config.ledger.auto_create_users,
        }
    }
}

impl From<&Config> for WalletSettings {
    fn from(config: &Config) -> Self {
        WalletSettings {
            slippage: config.wallets.default_slippage,
            gas_limit: config.wallets.default_gas_limit,
        }
    }
}

impl From<&Config> for ReferralOptions {
    fn from(config: &Config) -> Self {
        ReferralOptions {
            reward_per_referral: config.referrals.reward_per_referral,
            code_length: config.referrals.code_length,
            max_generation_attempts: config.referrals.max_generation_attempts,
        }
    }
}
