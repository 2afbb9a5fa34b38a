//! JSON file user store
//!
//! All users live in a single document (`users.json`) inside the data
//! directory. Commits take an exclusive advisory lock on `users.json.lock`,
//! re-read the file, check versions, and replace it through a unique temp
//! file + rename so readers never see a partial write and concurrent
//! processes never overwrite each other.

use async_trait::async_trait;
use fs2::FileExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::memory::apply_commit;
use crate::domain::UserRecord;
use crate::ports::{StoreError, UserStore};

pub const DEFAULT_STORE_FILE: &str = "users.json";

/// Current on-disk layout. Version 1 documents used `average_mcap`/`mcap`
/// and number-typed amounts; they are read through serde aliases and
/// rewritten at this version on the next commit.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default = "legacy_schema")]
    schema_version: u32,
    #[serde(default)]
    users: BTreeMap<String, UserRecord>,
}

fn legacy_schema() -> u32 {
    1
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            users: BTreeMap::new(),
        }
    }
}

impl StoreDocument {
    fn parse(content: &str, path: &Path) -> Result<Self, StoreError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let document: StoreDocument = serde_json::from_str(content)
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;

        if document.schema_version > SCHEMA_VERSION {
            return Err(StoreError::DeserializationError(format!(
                "schema version {} is newer than supported version {}",
                document.schema_version, SCHEMA_VERSION
            )));
        }
        if document.schema_version < SCHEMA_VERSION {
            tracing::info!(
                "Reading legacy store schema v{} from {} (will upgrade on next write)",
                document.schema_version,
                path.display()
            );
        }

        // early revisions allowed oversells; such positions have no valid state
        for user in document.users.values() {
            if let Some(position) = user.positions.iter().find(|p| p.amount < Decimal::ZERO) {
                return Err(StoreError::DeserializationError(format!(
                    "user {} holds negative amount {} of {} on {}",
                    user.user_id, position.amount, position.token_address, position.chain
                )));
            }
        }

        Ok(document)
    }
}

fn read_document_sync(path: &Path) -> Result<StoreDocument, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => StoreDocument::parse(&content, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
        Err(e) => Err(StoreError::ReadError(e.to_string())),
    }
}

fn write_document_sync(path: &Path, document: &StoreDocument) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let content = serde_json::to_string_pretty(document)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::WriteError(e.to_string()))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StoreError::WriteError(e.to_string()))?;
    tmp.persist(path).map_err(|e| StoreError::WriteError(e.error.to_string()))?;
    Ok(())
}

/// Lock, re-read, validate and replace. Runs on a blocking thread.
fn commit_sync(path: &Path, lock_path: &Path, records: Vec<UserRecord>) -> Result<Vec<String>, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteError(e.to_string()))?;
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| StoreError::WriteError(e.to_string()))?;
    lock_file
        .lock_exclusive()
        .map_err(|e| StoreError::WriteError(format!("failed to lock {}: {}", lock_path.display(), e)))?;

    let mut document = read_document_sync(path)?;
    let ids: Vec<String> = records.iter().map(|r| r.user_id.clone()).collect();
    apply_commit(&mut document.users, records)?;
    document.schema_version = SCHEMA_VERSION;
    write_document_sync(path, &document)?;

    // lock released when lock_file is dropped
    Ok(ids)
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
    lock_path: Arc<PathBuf>,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::with_path(data_dir.as_ref().join(DEFAULT_STORE_FILE))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let mut lock_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        lock_name.push(".lock");
        Self {
            lock_path: Arc::new(path.with_file_name(lock_name)),
            path: Arc::new(path),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_document(&self) -> Result<StoreDocument, StoreError> {
        match tokio::fs::read_to_string(self.path.as_path()).await {
            Ok(content) => StoreDocument::parse(&content, &self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(StoreError::ReadError(e.to_string())),
        }
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut document = self.read_document().await?;
        Ok(document.users.remove(user_id))
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>, StoreError> {
        let document = self.read_document().await?;
        Ok(document
            .users
            .into_values()
            .find(|u| u.referral.referral_code.as_deref() == Some(code)))
    }

    async fn commit(&self, records: Vec<UserRecord>) -> Result<(), StoreError> {
        // keeps this process's writers off the blocking pool while another holds the file lock
        let _guard = self.write_lock.lock().await;

        let path = Arc::clone(&self.path);
        let lock_path = Arc::clone(&self.lock_path);
        let ids = tokio::task::spawn_blocking(move || commit_sync(&path, &lock_path, records))
            .await
            .map_err(|e| StoreError::WriteError(format!("commit task failed: {}", e)))??;

        tracing::info!("Store saved: {} ({})", self.path.display(), ids.join(", "));
        Ok(())
    }
}
