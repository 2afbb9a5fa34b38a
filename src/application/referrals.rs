//! Referral program service

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use super::error::{LedgerError, LedgerResult};
use super::repository::{MissingUser, UserRepository};
use crate::domain::referral::{self, ReferralError, ReferralInfo, DEFAULT_CODE_LENGTH};
use crate::ports::StoreError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferralOptions {
    pub reward_per_referral: Decimal,
    pub code_length: usize,
    pub max_generation_attempts: u32,
}

impl Default for ReferralOptions {
    fn default() -> Self {
        Self {
            reward_per_referral: dec!(10),
            code_length: DEFAULT_CODE_LENGTH,
            max_generation_attempts: 16,
        }
    }
}

#[derive(Clone)]
pub struct ReferralService {
    repo: UserRepository,
    options: ReferralOptions,
}

impl ReferralService {
    pub fn new(repo: UserRepository, options: ReferralOptions) -> Self {
        Self { repo, options }
    }

    /// Assign a fresh unused code to an existing user, replacing any previous one.
    pub async fn generate_code(&self, user_id: &str) -> LedgerResult<String> {
        self.assign_code(user_id, true).await
    }

    /// Draw unused codes until one commits. With `replace` false an existing
    /// code is kept and returned; the check runs under the user's lock.
    async fn assign_code(&self, user_id: &str, replace: bool) -> LedgerResult<String> {
        self.repo.require(user_id).await?;

        for _ in 0..self.options.max_generation_attempts {
            let candidate = referral::generate_code(&mut rand::thread_rng(), self.options.code_length);
            if self.repo.find_by_referral_code(&candidate).await?.is_some() {
                continue;
            }

            let result = self
                .repo
                .update(user_id, MissingUser::Reject, |user, _| {
                    if !replace {
                        if let Some(existing) = &user.referral.referral_code {
                            return Ok((existing.clone(), false));
                        }
                    }
                    user.referral.referral_code = Some(candidate.clone());
                    Ok((candidate.clone(), true))
                })
                .await;

            match result {
                Ok((code, assigned)) => {
                    if assigned {
                        info!("Generated referral code {} for user {}", code, user_id);
                    }
                    return Ok(code);
                }
                // lost a race for this code, draw another
                Err(LedgerError::Store(StoreError::DuplicateReferralCode(_))) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::Internal(format!(
            "could not find an unused referral code after {} attempts",
            self.options.max_generation_attempts
        )))
    }

    /// Credit the owner of `code` for referring `user_id`.
    pub async fn process_referral(&self, code: &str, user_id: &str) -> LedgerResult<()> {
        let referrer = self
            .repo
            .find_by_referral_code(code)
            .await?
            .ok_or_else(|| LedgerError::NotFound("Invalid referral code".to_string()))?;

        if referrer.user_id == user_id {
            return Err(ReferralError::SelfReferral.into());
        }
        if self.repo.load(user_id).await?.is_none() {
            return Err(LedgerError::NotFound("Referred user not found".to_string()));
        }

        let reward = self.options.reward_per_referral;
        let result = self
            .repo
            .update_pair(&referrer.user_id, user_id, |referrer, referred, _| {
                // the code may have been regenerated since the lookup
                if referrer.referral.referral_code.as_deref() != Some(code) {
                    return Err(LedgerError::NotFound("Invalid referral code".to_string()));
                }
                referral::link(
                    &referrer.user_id,
                    &mut referrer.referral,
                    &referred.user_id,
                    &mut referred.referral,
                    reward,
                )?;
                Ok(())
            })
            .await;

        match &result {
            Ok(()) => info!("User {} referred by {} (code {})", user_id, referrer.user_id, code),
            Err(e) => warn!("Referral {} for user {} rejected: {}", code, user_id, e),
        }
        result
    }

    /// Referral stats; a code is generated on first access.
    pub async fn referral_info(&self, user_id: &str) -> LedgerResult<ReferralInfo> {
        let user = self.repo.require(user_id).await?;
        if user.referral.referral_code.is_some() {
            return Ok(user.referral.info());
        }

        self.assign_code(user_id, false).await?;
        Ok(self.repo.require(user_id).await?.referral.info())
    }
}
