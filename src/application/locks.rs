//! Per-user mutation serialization
//!
//! One async mutex per user id. Read-modify-write cycles on the same user run
//! one at a time inside this process; the store's version check covers other
//! processes. An entry lives only while some task holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[derive(Debug, Default)]
pub struct UserLocks {
    inner: LockMap,
}

/// Held locks; released on drop
pub struct UserGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    ids: Vec<String>,
    map: LockMap,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        // owned guards keep their mutex alive, release them before counting
        self.guards.clear();

        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        for id in &self.ids {
            if map.get(id).is_some_and(|handle| Arc::strong_count(handle) == 1) {
                map.remove(id);
            }
        }
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn lock(&self, user_id: &str) -> UserGuard {
        self.lock_many(&[user_id]).await
    }

    /// Lock several users in sorted order so concurrent callers cannot deadlock
    pub async fn lock_many(&self, user_ids: &[&str]) -> UserGuard {
        let mut ids: Vec<&str> = user_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guard = UserGuard {
            guards: Vec::with_capacity(ids.len()),
            ids: ids.iter().map(|id| id.to_string()).collect(),
            map: Arc::clone(&self.inner),
        };
        for id in ids {
            let handle = self.handle(id);
            guard.guards.push(handle.lock_owned().await);
        }
        guard
    }

    pub fn tracked_users(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }
}
