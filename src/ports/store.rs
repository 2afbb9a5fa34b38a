//! Persistence port for user documents

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::UserRecord;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Someone else committed this user since it was read
    #[error("Version conflict for user {user_id}: expected {expected}, found {found}")]
    VersionConflict {
        user_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Referral code already in use: {0}")]
    DuplicateReferralCode(String),

    #[error("Failed to read store: {0}")]
    ReadError(String),

    #[error("Failed to write store: {0}")]
    WriteError(String),

    #[error("Failed to serialize store: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize store: {0}")]
    DeserializationError(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Document store holding one record per user.
///
/// `commit` is all-or-nothing over the whole batch: every record's `version`
/// must equal the stored version (0 for a user that does not exist yet),
/// otherwise nothing is written and `VersionConflict` is returned. Written
/// records are stored with `version + 1`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn commit(&self, records: Vec<UserRecord>) -> Result<(), StoreError>;
}
