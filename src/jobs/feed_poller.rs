// ═══════════════════════════════════════════════════════════════════
// FEED POLLER: background job that keeps the entity store in sync
// ═══════════════════════════════════════════════════════════════════
//
// Every tick, each on its own tokio task:
// - fetch `GET /events` and reconcile it into the store (dropped on failure)
// - refresh the hackathon schedule
// - run every task of the task list
//
// A failing or panicking task is logged and isolated from the rest of the
// tick and from later ticks.
//
// Configuration via env:
//   POLL_INTERVAL_SECS  tick interval (default: 10s)
//   POLL_ENABLED        "false" disables the timer (default: true)
//

use futures::future::{join_all, BoxFuture};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::{
    api::metrics,
    services::{
        events_service::EventSource,
        schedule_service::ScheduleHandle,
        sync_service::{self, SyncReport},
    },
    store::EntityStore,
};

pub type TaskFuture = BoxFuture<'static, Result<(), String>>;
pub type PeriodicTask = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Ordered named tasks run on every tick
#[derive(Default, Clone)]
pub struct TaskList {
    tasks: Vec<(String, PeriodicTask)>,
}

impl TaskList {
    /// Adds `task` under `key`, replacing in place any task already there.
    /// Returns true when a task was replaced.
    pub fn register(&mut self, key: &str, task: PeriodicTask) -> bool {
        match self.tasks.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => {
                slot.1 = task;
                true
            }
            None => {
                self.tasks.push((key.to_string(), task));
                false
            }
        }
    }

    /// Returns false when no task had that key.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|(k, _)| k != key);
        self.tasks.len() != before
    }

    pub fn keys(&self) -> Vec<String> {
        self.tasks.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Synced(SyncReport),
    Failed(String),
    /// Shutdown was requested before the batch could be applied
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub fetch: FetchOutcome,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
}

#[derive(Clone)]
pub struct FeedPoller {
    store: EntityStore,
    source: Arc<dyn EventSource>,
    schedule: ScheduleHandle,
    tasks: Arc<RwLock<TaskList>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Running timer loop
pub struct PollerHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops the timer. Batches already fetched are discarded instead of
    /// being committed.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            log::error!("❌ Feed poller loop ended abnormally: {}", e);
        }
        log::info!("⏹️  Feed poller stopped");
    }
}

impl FeedPoller {
    pub fn new(store: EntityStore, source: Arc<dyn EventSource>, schedule: ScheduleHandle) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        FeedPoller {
            store,
            source,
            schedule,
            tasks: Arc::new(RwLock::new(TaskList::default())),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Registers `task` to run on every tick under `key`. Re-registering a
    /// key replaces the previous task.
    pub async fn register_task<F, Fut>(&self, key: &str, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let task: PeriodicTask = Arc::new(move || -> TaskFuture { Box::pin(task()) });
        let replaced = self.tasks.write().await.register(key, task);
        log::info!("⏱️  Set interval for key {}{}", key, if replaced { " (replaced)" } else { "" });
    }

    /// Removes the task under `key`; unknown keys are ignored.
    pub async fn remove_task(&self, key: &str) {
        if self.tasks.write().await.remove(key) {
            log::info!("⏱️  Cleared interval for key {}", key);
        } else {
            log::debug!("⏱️  No interval registered for key {}", key);
        }
    }

    pub async fn task_keys(&self) -> Vec<String> {
        self.tasks.read().await.keys()
    }

    /// Runs one tick and waits for all of its work to finish.
    pub async fn run_tick(&self, cycle: u64) -> TickReport {
        let start = std::time::Instant::now();
        metrics::increment_poll_ticks();

        let fetch = {
            let store = self.store.clone();
            let source = self.source.clone();
            let shutdown = self.shutdown_rx.clone();
            tokio::spawn(async move { fetch_and_sync(&store, source.as_ref(), &shutdown).await })
        };

        let schedule = {
            let store = self.store.clone();
            let handle = self.schedule.clone();
            tokio::spawn(async move {
                handle.refresh(&store).await;
            })
        };

        let tasks = self.tasks.read().await.clone();
        let task_handles: Vec<(String, JoinHandle<Result<(), String>>)> = tasks
            .tasks
            .into_iter()
            .map(|(key, task)| (key, tokio::spawn(task())))
            .collect();

        let fetch = match fetch.await {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::Failed(format!("fetch task panicked: {}", e)),
        };
        if let FetchOutcome::Failed(_) = fetch {
            metrics::increment_fetch_failures();
        }

        if let Err(e) = schedule.await {
            log::error!("❌ Schedule refresh panicked: {}", e);
        }

        let (keys, handles): (Vec<String>, Vec<_>) = task_handles.into_iter().unzip();
        let mut tasks_succeeded = 0;
        let mut tasks_failed = 0;
        for (key, result) in keys.iter().zip(join_all(handles).await) {
            match result {
                Ok(Ok(())) => tasks_succeeded += 1,
                Ok(Err(e)) => {
                    tasks_failed += 1;
                    log::error!("❌ Interval task '{}' failed: {}", key, e);
                }
                Err(e) => {
                    tasks_failed += 1;
                    log::error!("❌ Interval task '{}' panicked: {}", key, e);
                }
            }
        }
        if tasks_failed > 0 {
            metrics::increment_task_failures(tasks_failed as u64);
        }

        let elapsed = start.elapsed();
        if cycle % 10 == 0 {
            log::info!(
                "🔁 Poll cycle #{}: fetch {:?}, {} tasks ok, {} failed ({}ms)",
                cycle,
                fetch,
                tasks_succeeded,
                tasks_failed,
                elapsed.as_millis()
            );
        } else {
            log::debug!(
                "🔁 Poll cycle #{}: fetch {:?}, {} tasks ok, {} failed ({}ms)",
                cycle,
                fetch,
                tasks_succeeded,
                tasks_failed,
                elapsed.as_millis()
            );
        }

        TickReport { fetch, tasks_succeeded, tasks_failed }
    }

    /// Starts the repeating timer. The first tick fires immediately.
    pub fn start(self, every: Duration) -> PollerHandle {
        let every = every.max(Duration::from_millis(10));
        log::info!("🔁 Starting feed poller (interval: {:?})", every);

        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        let join = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut cycle: u64 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cycle += 1;
                        // Ticks run detached from the timer
                        let poller = self.clone();
                        tokio::spawn(async move {
                            poller.run_tick(cycle).await;
                        });
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        log::info!("✅ Feed poller started successfully");
        PollerHandle { shutdown_tx, join }
    }
}

async fn fetch_and_sync(
    store: &EntityStore,
    source: &dyn EventSource,
    shutdown: &watch::Receiver<bool>,
) -> FetchOutcome {
    let payload = match source.fetch_events().await {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("⚠️  Fetch events failed: {}", e);
            return FetchOutcome::Failed(e.to_string());
        }
    };

    if *shutdown.borrow() {
        log::debug!("⏹️  Shutdown requested, dropping fetched events");
        return FetchOutcome::Cancelled;
    }

    match sync_service::configure_events(store, &payload).await {
        Ok(report) => FetchOutcome::Synced(report),
        Err(e) => {
            log::error!("❌ Events batch dropped: {}", e);
            FetchOutcome::Failed(e.to_string())
        }
    }
}
