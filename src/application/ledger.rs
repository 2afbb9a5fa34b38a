//! Position Ledger service
//!
//! Records buy/sell events against per-user positions and reports realized
//! performance. Each recorded trade is one atomic update of the user document.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::error::{LedgerError, LedgerResult};
use super::repository::{MissingUser, UserRepository};
use crate::domain::{compute_history, PerformanceMetrics, Position, PositionStatus, Timeframe, TradeRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerOptions {
    /// Create the user on first trade instead of returning NotFound
    pub auto_create_users: bool,
}

#[derive(Clone)]
pub struct PositionLedger {
    repo: UserRepository,
    options: LedgerOptions,
}

impl PositionLedger {
    pub fn new(repo: UserRepository, options: LedgerOptions) -> Self {
        Self { repo, options }
    }

    /// Append a trade to the (token, chain) position and recompute it.
    ///
    /// Input is validated before the store is touched. On any error the
    /// stored document keeps its previous amount and transaction list.
    pub async fn record_transaction(&self, user_id: &str, request: TradeRequest) -> LedgerResult<Position> {
        request.validate()?;

        let missing = if self.options.auto_create_users {
            MissingUser::Create
        } else {
            MissingUser::Reject
        };

        let result = self
            .repo
            .update(user_id, missing, |user, now| {
                let idx = match user.position_index(&request.token_address, &request.chain) {
                    Some(idx) => idx,
                    None => {
                        let fresh = Position::new(
                            &request.token_address,
                            &request.chain,
                            &request.token_symbol,
                            &request.token_name,
                            now,
                        );
                        // sells against nothing fail here, before the position exists
                        fresh.check(&request)?;
                        user.positions.push(fresh);
                        user.positions.len() - 1
                    }
                };

                let position = &mut user.positions[idx];
                position.apply(&request, now)?;
                Ok(position.clone())
            })
            .await;

        match &result {
            Ok(position) => info!(
                "Recorded {} {} {} on {} for user {} -> amount {} @ avg {}",
                request.action,
                request.amount,
                position.token_symbol,
                position.chain,
                user_id,
                position.amount,
                position.average_basis
            ),
            Err(LedgerError::InsufficientBalance { available, requested }) => warn!(
                "Rejected sell for user {}: requested {} but only {} available",
                user_id, requested, available
            ),
            Err(e) => warn!("Failed to record trade for user {}: {}", user_id, e),
        }

        result
    }

    pub async fn list_positions(&self, user_id: &str, status: PositionStatus) -> LedgerResult<Vec<Position>> {
        let user = self.repo.require(user_id).await?;
        let positions: Vec<Position> = user.positions.into_iter().filter(|p| status.matches(p)).collect();
        debug!("Listed {} {:?} position(s) for user {}", positions.len(), status, user_id);
        Ok(positions)
    }

    pub async fn get_position(&self, user_id: &str, token_address: &str, chain: &str) -> LedgerResult<Position> {
        let user = self.repo.require(user_id).await?;
        user.position(token_address, chain)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound("Position not found".to_string()))
    }

    pub async fn compute_history(
        &self,
        user_id: &str,
        timeframe: Timeframe,
        detailed: bool,
    ) -> LedgerResult<PerformanceMetrics> {
        self.compute_history_at(user_id, timeframe, detailed, Utc::now()).await
    }

    pub async fn compute_history_at(
        &self,
        user_id: &str,
        timeframe: Timeframe,
        detailed: bool,
        now: DateTime<Utc>,
    ) -> LedgerResult<PerformanceMetrics> {
        let user = self.repo.require(user_id).await?;
        Ok(compute_history(&user.positions, timeframe, detailed, now)?)
    }
}
