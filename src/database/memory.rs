use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::database::{PendingWrites, PersistentStore, StoreSnapshot, UserWrite};
use crate::utils::AppError;

/// In-memory backend for tests and for running without a database.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    snapshot: Arc<Mutex<StoreSnapshot>>,
    failures: Arc<Mutex<u32>>,
    persist_calls: Arc<Mutex<u32>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        let backend = Self::default();
        *backend.lock_snapshot() = snapshot;
        backend
    }

    /// Makes the next `count` persist calls fail.
    pub fn fail_next_persists(&self, count: u32) {
        if let Ok(mut failures) = self.failures.lock() {
            *failures = count;
        }
    }

    /// Copy of what has been persisted so far
    pub fn persisted(&self) -> StoreSnapshot {
        self.lock_snapshot().clone()
    }

    pub fn persist_calls(&self) -> u32 {
        self.persist_calls.lock().map(|calls| *calls).unwrap_or(0)
    }

    fn lock_snapshot(&self) -> std::sync::MutexGuard<'_, StoreSnapshot> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PersistentStore for MemoryBackend {
    async fn load_all(&self) -> Result<StoreSnapshot, AppError> {
        Ok(self.lock_snapshot().clone())
    }

    async fn persist(&self, writes: PendingWrites) -> Result<(), AppError> {
        if let Ok(mut calls) = self.persist_calls.lock() {
            *calls += 1;
        }

        if let Ok(mut failures) = self.failures.lock() {
            if *failures > 0 {
                *failures -= 1;
                return Err(AppError::DatabaseError("simulated write failure".to_string()));
            }
        }

        let mut snapshot = self.lock_snapshot();

        match writes.user {
            Some(UserWrite::Upsert(user)) => snapshot.user = Some(user),
            Some(UserWrite::Delete) => snapshot.user = None,
            None => {}
        }

        for feed in writes.feeds {
            snapshot.feeds.retain(|f| f.id != feed.id);
            snapshot.feeds.push(feed);
        }
        for location in writes.locations {
            snapshot.locations.retain(|l| l.name != location.name);
            snapshot.locations.push(location);
        }
        for tag in writes.tags {
            snapshot.tags.retain(|t| t.name != tag.name);
            snapshot.tags.push(tag);
        }
        for item in writes.help_q {
            snapshot.help_q.retain(|h| h.id != item.id);
            snapshot.help_q.push(item);
        }
        if writes.last_updated.is_some() {
            snapshot.last_updated = writes.last_updated;
        }

        Ok(())
    }
}
