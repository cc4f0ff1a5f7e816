// ==================== ENTITY STORE ====================
// Process-wide object graph (users, feeds, locations, tags, help queue) handed
// to every component as an explicit `EntityStore` handle.
//
// Write authority: a `Transaction` holds the graph's write lock for its whole
// life and works on a private copy, so a batch is either committed as a whole
// or dropped without a trace. Do not call the store's own read methods while
// holding a transaction; use the transaction's accessors instead.

mod fetch;
mod graph;

pub use fetch::{Entity, FetchRequest};
pub use graph::ObjectGraph;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};
use tokio::task::JoinHandle;

use crate::database::{MemoryBackend, PersistentStore};
use crate::utils::AppError;

#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    graph: Arc<RwLock<ObjectGraph>>,
    backend: Arc<dyn PersistentStore>,
    // Serializes saves so two flushes never interleave their change sets
    save_lock: Mutex<()>,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct StoreCounts {
    pub users: usize,
    pub feeds: usize,
    pub locations: usize,
    pub tags: usize,
    pub help_q: usize,
}

impl EntityStore {
    /// Loads the persisted graph from `backend`.
    pub async fn open(backend: Arc<dyn PersistentStore>) -> Result<Self, AppError> {
        let snapshot = backend.load_all().await?;

        log::info!(
            "📦 Entity store loaded: {} feeds, {} locations, {} tags, {} help requests, user: {}",
            snapshot.feeds.len(),
            snapshot.locations.len(),
            snapshot.tags.len(),
            snapshot.help_q.len(),
            if snapshot.user.is_some() { "yes" } else { "no" }
        );

        Ok(Self::from_parts(backend, ObjectGraph::from_snapshot(snapshot)))
    }

    /// Empty store backed by memory only
    pub fn in_memory() -> Self {
        Self::from_parts(Arc::new(MemoryBackend::new()), ObjectGraph::new())
    }

    fn from_parts(backend: Arc<dyn PersistentStore>, graph: ObjectGraph) -> Self {
        EntityStore {
            inner: Arc::new(StoreInner {
                graph: Arc::new(RwLock::new(graph)),
                backend,
                save_lock: Mutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Takes write authority over the graph until the transaction is
    /// committed or dropped.
    pub async fn begin(&self) -> Transaction {
        let guard = self.inner.graph.clone().write_owned().await;
        let working = guard.clone();
        Transaction { guard, working, store: self.clone() }
    }

    /// All entities of kind `T`.
    pub async fn load<T: Entity>(&self) -> Vec<T> {
        self.load_with(|_: &mut FetchRequest<T>| {}).await
    }

    /// Entities of kind `T`, filtered and sorted by `configure`.
    pub async fn load_with<T, F>(&self, configure: F) -> Vec<T>
    where
        T: Entity,
        F: FnOnce(&mut FetchRequest<T>),
    {
        let mut request = FetchRequest::default();
        configure(&mut request);

        let items = {
            let graph = self.inner.graph.read().await;
            T::collect(&graph)
        };

        let items = request.apply(items);
        log::debug!("📖 Loaded {} {} entities", items.len(), T::KIND);
        items
    }

    pub async fn read<R>(&self, f: impl FnOnce(&ObjectGraph) -> R) -> R {
        let graph = self.inner.graph.read().await;
        f(&graph)
    }

    pub async fn has_changes(&self) -> bool {
        self.inner.graph.read().await.has_changes()
    }

    pub async fn counts(&self) -> StoreCounts {
        let graph = self.inner.graph.read().await;
        StoreCounts {
            users: graph.user().iter().count(),
            feeds: graph.feeds().count(),
            locations: graph.locations().count(),
            tags: graph.tags().count(),
            help_q: graph.help_q().count(),
        }
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.graph.read().await.last_updated()
    }

    pub async fn set_last_updated(&self, time: DateTime<Utc>) -> Result<(), AppError> {
        let mut tx = self.begin().await;
        tx.set_last_updated(time);
        tx.commit()
    }

    /// Persists pending changes on the calling task. Returns how many entity
    /// writes were flushed. On failure the changes stay pending.
    pub async fn save_now(&self) -> Result<usize, AppError> {
        let _saving = self.inner.save_lock.lock().await;

        let (changes, writes) = {
            let mut graph = self.inner.graph.write().await;
            if !graph.has_changes() {
                return Ok(0);
            }
            graph.take_pending_writes()
        };

        let count = writes.len();
        match self.inner.backend.persist(writes).await {
            Ok(()) => {
                log::debug!("💾 Saved {} pending writes", count);
                Ok(count)
            }
            Err(e) => {
                self.inner.graph.write().await.restore_changes(changes);
                Err(e)
            }
        }
    }

    /// Persists pending changes on a background task. Errors are logged and
    /// the changes stay pending for the next save.
    pub fn save_in_background(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_now().await {
                log::error!("❌ Error while saving: {}", e);
            }
        })
    }

    /// Refuses further commits. Saves keep working so shutdown can flush.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.inner.backend.health_check().await
    }
}

/// Exclusive working copy of the graph
pub struct Transaction {
    guard: OwnedRwLockWriteGuard<ObjectGraph>,
    working: ObjectGraph,
    store: EntityStore,
}

impl Transaction {
    /// Installs the working copy. Fails without touching the graph once the
    /// store has been closed.
    pub fn commit(self) -> Result<(), AppError> {
        let Transaction { mut guard, working, store } = self;
        if store.is_closed() {
            return Err(AppError::DatabaseError("store is closed, batch discarded".to_string()));
        }
        *guard = working;
        Ok(())
    }

    /// Drops the working copy. Same as letting the transaction go out of scope.
    pub fn rollback(self) {}
}

impl Deref for Transaction {
    type Target = ObjectGraph;

    fn deref(&self) -> &ObjectGraph {
        &self.working
    }
}

impl DerefMut for Transaction {
    fn deref_mut(&mut self) -> &mut ObjectGraph {
        &mut self.working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreSnapshot;
    use crate::models::{Feed, Tag};
    use std::collections::BTreeSet;

    fn tag(name: &str) -> Tag {
        Tag { name: name.to_string(), feeds: BTreeSet::new() }
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_store_unchanged() {
        let store = EntityStore::in_memory();

        {
            let mut tx = store.begin().await;
            tx.insert_tag(tag("HACKATHON"));
            tx.rollback();
        }

        assert!(store.load::<Tag>().await.is_empty());
        assert!(!store.has_changes().await);
    }

    #[tokio::test]
    async fn test_commit_installs_working_copy() {
        let store = EntityStore::in_memory();

        let mut tx = store.begin().await;
        tx.insert_tag(tag("HACKATHON"));
        tx.commit().unwrap();

        let tags = store.load::<Tag>().await;
        assert_eq!(tags.len(), 1);
        assert!(store.has_changes().await);
    }

    #[tokio::test]
    async fn test_closed_store_refuses_commits() {
        let store = EntityStore::in_memory();
        store.close();

        let mut tx = store.begin().await;
        tx.insert_tag(tag("HACKATHON"));
        assert!(tx.commit().is_err());
        assert!(store.load::<Tag>().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_now_flushes_to_backend() {
        let backend = MemoryBackend::new();
        let store = EntityStore::open(Arc::new(backend.clone())).await.unwrap();

        let mut tx = store.begin().await;
        tx.insert_tag(tag("FOOD"));
        tx.commit().unwrap();

        assert_eq!(store.save_now().await.unwrap(), 1);
        assert!(!store.has_changes().await);
        assert_eq!(backend.persisted().tags.len(), 1);

        // Nothing pending, nothing written
        assert_eq!(store.save_now().await.unwrap(), 0);
        assert_eq!(backend.persist_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_changes_pending() {
        let backend = MemoryBackend::new();
        let store = EntityStore::open(Arc::new(backend.clone())).await.unwrap();

        let mut tx = store.begin().await;
        tx.insert_tag(tag("FOOD"));
        tx.commit().unwrap();

        backend.fail_next_persists(1);
        assert!(store.save_now().await.is_err());
        assert!(store.has_changes().await);

        store.save_in_background().await.unwrap();
        assert!(!store.has_changes().await);
        assert_eq!(backend.persisted().tags.len(), 1);
    }

    #[tokio::test]
    async fn test_open_reads_backend_snapshot() {
        let snapshot = StoreSnapshot {
            tags: vec![tag("HACKATHON")],
            last_updated: Some(Utc::now()),
            ..Default::default()
        };
        let store = EntityStore::open(Arc::new(MemoryBackend::with_snapshot(snapshot))).await.unwrap();

        assert_eq!(store.counts().await.tags, 1);
        assert!(store.last_updated().await.is_some());
        assert!(!store.has_changes().await);
    }

    #[tokio::test]
    async fn test_last_updated_is_persisted() {
        let backend = MemoryBackend::new();
        let store = EntityStore::open(Arc::new(backend.clone())).await.unwrap();
        let stamp = DateTime::from_timestamp(1487973600, 0).unwrap();

        store.set_last_updated(stamp).await.unwrap();
        assert_eq!(store.last_updated().await, Some(stamp));

        store.save_now().await.unwrap();
        assert_eq!(backend.persisted().last_updated, Some(stamp));
    }

    #[tokio::test]
    async fn test_load_with_filters_and_sorts() {
        let store = EntityStore::in_memory();

        let mut tx = store.begin().await;
        for (id, ts) in [(1, 300), (2, 100), (3, 200)] {
            let time = DateTime::from_timestamp(ts, 0).unwrap();
            tx.upsert_feed_fields(id, "event", time, (id != 3).then(|| "HACKATHON".to_string()));
        }
        tx.commit().unwrap();

        let feeds = store
            .load_with(|request: &mut FetchRequest<Feed>| {
                request.filter(|f| f.is_schedule_marker()).sort_by(|a, b| a.time.cmp(&b.time));
            })
            .await;

        let ids: Vec<i64> = feeds.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
