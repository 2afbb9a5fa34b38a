//! Wallet management service

use tracing::info;

use super::error::LedgerResult;
use super::repository::{MissingUser, UserRepository};
use crate::domain::{NewWallet, SettingsUpdate, WalletError, WalletSettings, WalletUpdate, WalletView};

#[derive(Clone)]
pub struct WalletService {
    repo: UserRepository,
    defaults: WalletSettings,
}

impl WalletService {
    pub fn new(repo: UserRepository, defaults: WalletSettings) -> Self {
        Self { repo, defaults }
    }

    /// Attach a wallet, creating the user on first use.
    pub async fn create_wallet(&self, user_id: &str, request: NewWallet) -> LedgerResult<WalletView> {
        let wallet = request.into_wallet(self.defaults, chrono::Utc::now())?;
        let view = self
            .repo
            .update(user_id, MissingUser::Create, |user, _| {
                user.add_wallet(wallet.clone())?;
                Ok(wallet.view())
            })
            .await?;

        info!("Created wallet '{}' for user {}", view.name, user_id);
        Ok(view)
    }

    pub async fn list_wallets(&self, user_id: &str) -> LedgerResult<Vec<WalletView>> {
        let user = self.repo.require(user_id).await?;
        Ok(user.wallets.iter().map(|w| w.view()).collect())
    }

    pub async fn get_wallet(&self, user_id: &str, name: &str) -> LedgerResult<WalletView> {
        let user = self.repo.require(user_id).await?;
        let wallet = user
            .wallet(name)
            .ok_or_else(|| WalletError::NotFound(name.to_string()))?;
        Ok(wallet.view())
    }

    pub async fn update_wallet(&self, user_id: &str, name: &str, update: WalletUpdate) -> LedgerResult<WalletView> {
        let view = self
            .repo
            .update(user_id, MissingUser::Reject, |user, _| {
                let wallet = user.wallet_mut(name)?;
                wallet.apply_update(&update);
                Ok(wallet.view())
            })
            .await?;

        info!("Updated wallet '{}' for user {}", name, user_id);
        Ok(view)
    }

    pub async fn delete_wallet(&self, user_id: &str, name: &str) -> LedgerResult<()> {
        self.repo
            .update(user_id, MissingUser::Reject, |user, _| {
                user.remove_wallet(name)?;
                Ok(())
            })
            .await?;

        info!("Deleted wallet '{}' for user {}", name, user_id);
        Ok(())
    }

    pub async fn get_settings(&self, user_id: &str, name: &str) -> LedgerResult<WalletSettings> {
        let user = self.repo.require(user_id).await?;
        let wallet = user
            .wallet(name)
            .ok_or_else(|| WalletError::NotFound(name.to_string()))?;
        Ok(wallet.settings)
    }

    pub async fn update_settings(
        &self,
        user_id: &str,
        name: &str,
        update: SettingsUpdate,
    ) -> LedgerResult<WalletSettings> {
        if update.is_empty() {
            return Err(super::error::LedgerError::Validation("Settings object is required".to_string()));
        }

        let settings = self
            .repo
            .update(user_id, MissingUser::Reject, |user, _| {
                let wallet = user.wallet_mut(name)?;
                Ok(wallet.apply_settings(&update)?)
            })
            .await?;

        info!(
            "Updated settings for wallet '{}' of user {}: slippage {}%, gas limit {}",
            name, user_id, settings.slippage, settings.gas_limit
        );
        Ok(settings)
    }
}
