//! User aggregate root
//!
//! A `UserRecord` is the unit of persistence: wallets, positions and referral
//! fields are always read and written together. `version` is the optimistic
//! concurrency token; stores bump it on every successful commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Position;
use super::referral::ReferralState;
use super::wallet::{Wallet, WalletError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(alias = "telegram_id")]
    pub user_id: String,
    #[serde(default, alias = "evm_wallets")]
    pub wallets: Vec<Wallet>,
    #[serde(default, alias = "trade_positions")]
    pub positions: Vec<Position>,
    #[serde(flatten)]
    pub referral: ReferralState,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Fresh, never-persisted user (version 0)
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            wallets: Vec::new(),
            positions: Vec::new(),
            referral: ReferralState::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn position(&self, token_address: &str, chain: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.matches_key(token_address, chain))
    }

    pub fn position_index(&self, token_address: &str, chain: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.matches_key(token_address, chain))
    }

    pub fn wallet(&self, name: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.name == name)
    }

    pub fn wallet_mut(&mut self, name: &str) -> Result<&mut Wallet, WalletError> {
        self.wallets
            .iter_mut()
            .find(|w| w.name == name)
            .ok_or_else(|| WalletError::NotFound(name.to_string()))
    }

    pub fn add_wallet(&mut self, wallet: Wallet) -> Result<(), WalletError> {
        if self.wallet(&wallet.name).is_some() {
            return Err(WalletError::DuplicateName(wallet.name));
        }
        self.wallets.push(wallet);
        Ok(())
    }

    pub fn remove_wallet(&mut self, name: &str) -> Result<Wallet, WalletError> {
        let idx = self
            .wallets
            .iter()
            .position(|w| w.name == name)
            .ok_or_else(|| WalletError::NotFound(name.to_string()))?;
        Ok(self.wallets.remove(idx))
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
