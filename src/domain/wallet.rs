//! EVM wallets attached to a user and their trading settings

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_SLIPPAGE_PCT: Decimal = dec!(0.1);
pub const MAX_SLIPPAGE_PCT: Decimal = dec!(100);
pub const MIN_GAS_LIMIT: u64 = 21_000;
pub const MAX_GAS_LIMIT: u64 = 1_000_000;
pub const DEFAULT_SLIPPAGE_PCT: Decimal = dec!(10);
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletError {
    #[error("Missing required wallet information: {0}")]
    MissingField(&'static str),
    #[error("Slippage must be between 0.1 and 100 percent, got {0}")]
    InvalidSlippage(Decimal),
    #[error("Gas limit must be between 21000 and 1000000, got {0}")]
    InvalidGasLimit(u64),
    #[error("Wallet with this name already exists: {0}")]
    DuplicateName(String),
    #[error("Wallet not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Slippage tolerance in percent
    pub slippage: Decimal,
    pub gas_limit: u64,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            slippage: DEFAULT_SLIPPAGE_PCT,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

impl WalletSettings {
    pub fn validate(&self) -> Result<(), WalletError> {
        validate_slippage(self.slippage)?;
        validate_gas_limit(self.gas_limit)
    }
}

fn validate_slippage(slippage: Decimal) -> Result<(), WalletError> {
    if slippage < MIN_SLIPPAGE_PCT || slippage > MAX_SLIPPAGE_PCT {
        return Err(WalletError::InvalidSlippage(slippage));
    }
    Ok(())
}

fn validate_gas_limit(gas_limit: u64) -> Result<(), WalletError> {
    if !(MIN_GAS_LIMIT..=MAX_GAS_LIMIT).contains(&gas_limit) {
        return Err(WalletError::InvalidGasLimit(gas_limit));
    }
    Ok(())
}

/// Partial settings change; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub slippage: Option<Decimal>,
    pub gas_limit: Option<u64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.slippage.is_none() && self.gas_limit.is_none()
    }

    /// Fill missing fields from `defaults` and validate the result
    pub fn resolve(&self, defaults: WalletSettings) -> Result<WalletSettings, WalletError> {
        let settings = WalletSettings {
            slippage: self.slippage.unwrap_or(defaults.slippage),
            gas_limit: self.gas_limit.unwrap_or(defaults.gas_limit),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub name: String,
    pub address: String,
    pub private_key: String,
    pub seed_phrase: String,
    #[serde(default)]
    pub settings: WalletSettings,
    pub created_at: DateTime<Utc>,
}

/// Request to attach a new wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWallet {
    pub name: String,
    pub address: String,
    pub private_key: String,
    pub seed_phrase: String,
    #[serde(default)]
    pub settings: SettingsUpdate,
}

impl NewWallet {
    pub fn into_wallet(self, defaults: WalletSettings, now: DateTime<Utc>) -> Result<Wallet, WalletError> {
        let required = [
            ("name", &self.name),
            ("address", &self.address),
            ("private_key", &self.private_key),
            ("seed_phrase", &self.seed_phrase),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(WalletError::MissingField(field));
            }
        }

        let settings = self.settings.resolve(defaults)?;
        Ok(Wallet {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            private_key: self.private_key,
            seed_phrase: self.seed_phrase,
            settings,
            created_at: now,
        })
    }
}

/// Credential/address change; blank or absent fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletUpdate {
    pub address: Option<String>,
    pub private_key: Option<String>,
    pub seed_phrase: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.trim().is_empty())
}

impl Wallet {
    pub fn apply_update(&mut self, update: &WalletUpdate) {
        if let Some(address) = non_blank(&update.address) {
            self.address = address.trim().to_string();
        }
        if let Some(key) = non_blank(&update.private_key) {
            self.private_key = key.clone();
        }
        if let Some(seed) = non_blank(&update.seed_phrase) {
            self.seed_phrase = seed.clone();
        }
    }

    /// Validates every provided field before changing anything
    pub fn apply_settings(&mut self, update: &SettingsUpdate) -> Result<WalletSettings, WalletError> {
        let settings = update.resolve(self.settings)?;
        self.settings = settings;
        Ok(settings)
    }

    pub fn view(&self) -> WalletView {
        WalletView {
            name: self.name.clone(),
            address: self.address.clone(),
            settings: self.settings,
            created_at: self.created_at,
        }
    }
}

/// Public wallet information, without credential material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletView {
    pub name: String,
    pub address: String,
    pub settings: WalletSettings,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_wallet(name: &str) -> NewWallet {
        NewWallet {
            name: name.to_string(),
            address: "0xaddr".to_string(),
            private_key: "0xkey".to_string(),
            seed_phrase: "seed words".to_string(),
            settings: SettingsUpdate::default(),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let wallet = new_wallet("main").into_wallet(WalletSettings::default(), Utc::now()).unwrap();
        assert_eq!(wallet.settings.slippage, dec!(10));
        assert_eq!(wallet.settings.gas_limit, 300_000);
    }

    #[test]
    fn test_missing_fields() {
        let mut request = new_wallet("main");
        request.seed_phrase = String::new();
        assert_eq!(
            request.into_wallet(WalletSettings::default(), Utc::now()),
            Err(WalletError::MissingField("seed_phrase"))
        );
    }

    #[test]
    fn test_settings_bounds() {
        let defaults = WalletSettings::default();
        let ok = SettingsUpdate { slippage: Some(dec!(0.1)), gas_limit: Some(1_000_000) };
        assert!(ok.resolve(defaults).is_ok());

        let low = SettingsUpdate { slippage: Some(dec!(0.09)), gas_limit: None };
        assert_eq!(low.resolve(defaults), Err(WalletError::InvalidSlippage(dec!(0.09))));

        let high_gas = SettingsUpdate { slippage: None, gas_limit: Some(20_999) };
        assert_eq!(high_gas.resolve(defaults), Err(WalletError::InvalidGasLimit(20_999)));
    }

    #[test]
    fn test_invalid_settings_leave_wallet_unchanged() {
        let mut wallet = new_wallet("main").into_wallet(WalletSettings::default(), Utc::now()).unwrap();
        let update = SettingsUpdate { slippage: Some(dec!(5)), gas_limit: Some(5) };
        assert!(wallet.apply_settings(&update).is_err());
        assert_eq!(wallet.settings, WalletSettings::default());

        let update = SettingsUpdate { slippage: Some(dec!(5)), gas_limit: None };
        let settings = wallet.apply_settings(&update).unwrap();
        assert_eq!(settings.slippage, dec!(5));
        assert_eq!(settings.gas_limit, DEFAULT_GAS_LIMIT);
    }

    #[test]
    fn test_update_ignores_blank_fields() {
        let mut wallet = new_wallet("main").into_wallet(WalletSettings::default(), Utc::now()).unwrap();
        wallet.apply_update(&WalletUpdate {
            address: Some("0xnew".to_string()),
            private_key: Some("".to_string()),
            seed_phrase: None,
        });
        assert_eq!(wallet.address, "0xnew");
        assert_eq!(wallet.private_key, "0xkey");
    }

    #[test]
    fn test_view_hides_secrets() {
        let wallet = new_wallet("main").into_wallet(WalletSettings::default(), Utc::now()).unwrap();
        let json = serde_json::to_string(&wallet.view()).unwrap();
        assert!(!json.contains("0xkey"));
        assert!(!json.contains("seed words"));
    }
}
