//! Transactional access to user documents
//!
//! Every mutation runs as: lock user(s) -> load -> mutate a copy -> commit.
//! A failed mutation or commit leaves the stored document untouched. Version
//! conflicts from other writers re-run the cycle up to `max_retries` times.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::error::{LedgerError, LedgerResult};
use super::locks::UserLocks;
use crate::domain::UserRecord;
use crate::ports::UserStore;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What to do when the target user does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingUser {
    Create,
    Reject,
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn UserStore>,
    locks: Arc<UserLocks>,
    max_retries: u32,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            locks: Arc::new(UserLocks::new()),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn load(&self, user_id: &str) -> LedgerResult<Option<UserRecord>> {
        Ok(self.store.load(user_id).await?)
    }

    pub async fn require(&self, user_id: &str) -> LedgerResult<UserRecord> {
        self.load(user_id).await?.ok_or_else(LedgerError::user_not_found)
    }

    pub async fn find_by_referral_code(&self, code: &str) -> LedgerResult<Option<UserRecord>> {
        Ok(self.store.find_by_referral_code(code).await?)
    }

    /// Mutate one user atomically and return what `mutate` produced.
    pub async fn update<T, F>(&self, user_id: &str, missing: MissingUser, mut mutate: F) -> LedgerResult<T>
    where
        F: FnMut(&mut UserRecord, DateTime<Utc>) -> LedgerResult<T>,
    {
        let _guard = self.locks.lock(user_id).await;

        for attempt in 0..=self.max_retries {
            let now = Utc::now();
            let mut record = match (self.store.load(user_id).await?, missing) {
                (Some(record), _) => record,
                (None, MissingUser::Create) => UserRecord::new(user_id, now),
                (None, MissingUser::Reject) => return Err(LedgerError::user_not_found()),
            };

            let output = mutate(&mut record, now)?;
            record.touch(now);

            match self.store.commit(vec![record]).await {
                Ok(()) => return Ok(output),
                Err(e) if e.is_conflict() => {
                    tracing::warn!("Commit conflict for user {} (attempt {}): {}", user_id, attempt + 1, e);
                }
                Err(e) => {
                    tracing::error!("Commit failed for user {}: {}", user_id, e);
                    return Err(e.into());
                }
            }
        }

        Err(LedgerError::Internal(format!(
            "user {} was modified concurrently; gave up after {} retries",
            user_id, self.max_retries
        )))
    }

    /// Mutate two existing users in one atomic commit. Both are locked,
    /// reloaded and handed to `mutate`; a missing user is `NotFound`.
    pub async fn update_pair<T, F>(&self, first_id: &str, second_id: &str, mut mutate: F) -> LedgerResult<T>
    where
        F: FnMut(&mut UserRecord, &mut UserRecord, DateTime<Utc>) -> LedgerResult<T>,
    {
        let _guard = self.locks.lock_many(&[first_id, second_id]).await;

        for attempt in 0..=self.max_retries {
            let now = Utc::now();
            let mut first = self.require(first_id).await?;
            let mut second = if first_id == second_id {
                first.clone()
            } else {
                self.require(second_id).await?
            };

            let output = mutate(&mut first, &mut second, now)?;
            first.touch(now);
            second.touch(now);

            let batch = if first_id == second_id { vec![first] } else { vec![first, second] };
            match self.store.commit(batch).await {
                Ok(()) => return Ok(output),
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        "Commit conflict for users {}/{} (attempt {}): {}",
                        first_id,
                        second_id,
                        attempt + 1,
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::Internal(format!(
            "users {}/{} were modified concurrently; gave up after {} retries",
            first_id, second_id, self.max_retries
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUserStore;
    use crate::ports::{MockUserStore, StoreError};

    #[tokio::test]
    async fn test_update_creates_when_allowed() {
        let repo = UserRepository::new(Arc::new(InMemoryUserStore::new()));
        let missing = repo.update("1", MissingUser::Reject, |_, _| Ok(())).await;
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));

        repo.update("1", MissingUser::Create, |_, _| Ok(())).await.unwrap();
        assert_eq!(repo.require("1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_mutation_error_skips_commit() {
        let mut store = MockUserStore::new();
        store.expect_load().returning(|id| Ok(Some(UserRecord::new(id, Utc::now()))));
        store.expect_commit().never();

        let repo = UserRepository::new(Arc::new(store));
        let result: LedgerResult<()> = repo
            .update("1", MissingUser::Reject, |_, _| Err(LedgerError::Validation("nope".into())))
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_conflicts_retried_then_given_up() {
        let mut store = MockUserStore::new();
        store.expect_load().returning(|id| Ok(Some(UserRecord::new(id, Utc::now()))));
        store.expect_commit().times(3).returning(|records| {
            Err(StoreError::VersionConflict {
                user_id: records[0].user_id.clone(),
                expected: 0,
                found: 1,
            })
        });

        let repo = UserRepository::new(Arc::new(store)).with_max_retries(2);
        let result = repo.update("1", MissingUser::Reject, |_, _| Ok(())).await;
        assert!(matches!(result, Err(LedgerError::Internal(_))));
    }

    #[tokio::test]
    async fn test_store_failure_not_retried() {
        let mut store = MockUserStore::new();
        store.expect_load().returning(|id| Ok(Some(UserRecord::new(id, Utc::now()))));
        store
            .expect_commit()
            .times(1)
            .returning(|_| Err(StoreError::WriteError("disk full".into())));

        let repo = UserRepository::new(Arc::new(store));
        let result = repo.update("1", MissingUser::Reject, |_, _| Ok(())).await;
        assert!(matches!(result, Err(LedgerError::Store(StoreError::WriteError(_)))));
    }
}
