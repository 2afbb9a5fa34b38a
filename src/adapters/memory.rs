//! In-memory user store
//!
//! Used for tests and for the `memory` storage backend. Also hosts the commit
//! rules shared with the file store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::UserRecord;
use crate::ports::{StoreError, UserStore};

/// Validate a batch against `users` and apply it. Nothing changes on error.
pub(crate) fn apply_commit(
    users: &mut BTreeMap<String, UserRecord>,
    records: Vec<UserRecord>,
) -> Result<(), StoreError> {
    for record in &records {
        let found = users.get(&record.user_id).map_or(0, |u| u.version);
        if found != record.version {
            return Err(StoreError::VersionConflict {
                user_id: record.user_id.clone(),
                expected: record.version,
                found,
            });
        }
    }

    for (i, record) in records.iter().enumerate() {
        let Some(code) = record.referral.referral_code.as_deref() else {
            continue;
        };
        let taken_in_store = users.values().any(|u| {
            u.user_id != record.user_id
                && !records.iter().any(|r| r.user_id == u.user_id)
                && u.referral.referral_code.as_deref() == Some(code)
        });
        let taken_in_batch = records[..i]
            .iter()
            .any(|r| r.user_id != record.user_id && r.referral.referral_code.as_deref() == Some(code));
        if taken_in_store || taken_in_batch {
            return Err(StoreError::DuplicateReferralCode(code.to_string()));
        }
    }

    for mut record in records {
        record.version += 1;
        users.insert(record.user_id.clone(), record);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.referral.referral_code.as_deref() == Some(code))
            .cloned())
    }

    async fn commit(&self, records: Vec<UserRecord>) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let count = records.len();
        apply_commit(&mut users, records)?;
        tracing::debug!("Committed {} user record(s) to memory store", count);
        Ok(())
    }
}
