//! Periodic sync and inbox scanning.
//!
//! The host registers one periodic task through a [`TaskRegistrar`]. Each
//! invocation is independent: the only state carried between cycles is
//! what the trust store has persisted (last sync time and inbox cursor).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use trust_store::TrustStore;

use crate::classifier::MessageClassifier;
use crate::inbox::MessageSupplier;
use crate::reconcile::{ReconcileSummary, Reconciler};

/// Maximum age of a successful sync before another is attempted.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(6 * 60 * 60);

/// How often the periodic task fires.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Time budget for one cycle, standing in for the host's background limit.
pub const DEFAULT_CYCLE_BUDGET: Duration = Duration::from_secs(30);

/// Whether a sync is due at `now` given the last successful one.
///
/// A last sync more than one window in the future was stamped by a clock
/// that ran ahead, and counts as stale.
pub fn needs_sync(last_sync: Option<u64>, now: u64, window: Duration) -> bool {
    match last_sync {
        None => true,
        Some(last) => u128::from(last.abs_diff(now)) > window.as_millis(),
    }
}

/// What the sync half of a cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// The last sync is within the freshness window.
    Fresh { age_ms: u64 },
    /// A reconciliation committed.
    Synced(ReconcileSummary),
    /// The attempt failed and will be retried next cycle.
    Failed(String),
    /// No remote authority is configured; the cycle only classifies.
    NoSource,
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub sync: SyncOutcome,
    /// Inbound messages classified this cycle.
    pub classified: usize,
}

/// Body of a periodic background task.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &str;

    /// Run one cycle. Must not fail; problems are logged.
    async fn run(&self);
}

/// Host capability to run a task repeatedly, at most once per interval.
pub trait TaskRegistrar {
    fn register_periodic(&self, task: Arc<dyn PeriodicTask>, min_interval: Duration) -> TaskHandle;
}

/// Aborts the cycle when dropped, including when the schedule itself is
/// cancelled while awaiting it.
struct CycleGuard(JoinHandle<()>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a registered periodic task.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop scheduling further cycles and abort one in flight.
    pub fn cancel(&self) {
        info!(task = %self.name, "Cancelling periodic task");
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// [`TaskRegistrar`] on the tokio runtime.
///
/// Every cycle runs as its own task under the cycle budget. A cycle that
/// panics or overruns is logged as failed and the schedule continues.
#[derive(Debug, Clone)]
pub struct TokioRegistrar {
    cycle_budget: Duration,
}

impl Default for TokioRegistrar {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLE_BUDGET)
    }
}

impl TokioRegistrar {
    pub fn new(cycle_budget: Duration) -> Self {
        Self { cycle_budget }
    }
}

impl TaskRegistrar for TokioRegistrar {
    fn register_periodic(&self, task: Arc<dyn PeriodicTask>, min_interval: Duration) -> TaskHandle {
        let name = task.name().to_string();
        let budget = self.cycle_budget;

        info!(task = %name, interval = ?min_interval, budget = ?budget, "Registering periodic task");

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(min_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let cycle_task = Arc::clone(&task);
                let mut cycle = CycleGuard(tokio::spawn(async move { cycle_task.run().await }));

                match timeout(budget, &mut cycle.0).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(task = %task_name, error = %e, "Periodic cycle panicked"),
                    Err(_) => {
                        warn!(task = %task_name, budget = ?budget, "Periodic cycle exceeded its budget")
                    }
                }
            }
        });

        TaskHandle { name, handle }
    }
}

/// The periodic task body: classify new inbound messages, then sync the
/// trust store if it is stale.
#[derive(Clone)]
pub struct SyncCycle {
    store: TrustStore,
    reconciler: Option<Reconciler>,
    classifier: MessageClassifier,
    inbox: Option<Arc<dyn MessageSupplier>>,
    freshness_window: Duration,
}

impl SyncCycle {
    pub fn new(reconciler: Reconciler, classifier: MessageClassifier) -> Self {
        Self {
            store: reconciler.store().clone(),
            reconciler: Some(reconciler),
            classifier,
            inbox: None,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    /// A cycle that only scans the inbox, for when no remote authority is
    /// configured.
    pub fn classify_only(store: TrustStore, classifier: MessageClassifier) -> Self {
        Self {
            store,
            reconciler: None,
            classifier,
            inbox: None,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    pub fn with_inbox(mut self, inbox: Arc<dyn MessageSupplier>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Run one cycle as of `now` (epoch millis).
    pub async fn run_cycle_at(&self, now: u64) -> CycleReport {
        // Classification is local only, so it goes first and never waits
        // behind the network.
        let classified = self.classify_new_messages(now).await;
        let sync = self.sync_if_stale(now).await;

        CycleReport { sync, classified }
    }

    async fn sync_if_stale(&self, now: u64) -> SyncOutcome {
        let Some(reconciler) = &self.reconciler else {
            return SyncOutcome::NoSource;
        };

        let last_sync = match self.store.last_sync_time().await {
            Ok(last) => last,
            Err(e) => {
                warn!(error = %e, "Could not read last sync time, treating store as stale");
                None
            }
        };

        if !needs_sync(last_sync, now, self.freshness_window) {
            let age_ms = last_sync.map_or(0, |last| now.saturating_sub(last));
            debug!(age_ms, "Signal sets are fresh, skipping sync");
            return SyncOutcome::Fresh { age_ms };
        }

        match reconciler.reconcile_at(now).await {
            Ok(summary) => {
                // The monotonic write kept a future stamp in place.
                if last_sync.is_some_and(|last| last > now) {
                    if let Err(e) = self.store.rewind_last_sync_time(now).await {
                        warn!(error = %e, "Could not rewind future last sync time");
                    }
                }
                SyncOutcome::Synced(summary)
            }
            Err(e) => {
                warn!(error = %e, "Sync cycle failed, retrying next cycle");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    async fn classify_new_messages(&self, now: u64) -> usize {
        let Some(inbox) = &self.inbox else {
            return 0;
        };

        let store = &self.store;
        let cursor = match store.inbox_cursor().await {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(error = %e, "Could not read inbox cursor, skipping scan");
                return 0;
            }
        };

        let messages = match inbox.messages_since(cursor).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Inbox scan failed");
                return 0;
            }
        };

        let mut newest = cursor;
        for message in &messages {
            self.classifier.classify(message).await;
            newest = newest.max(message.observed_at);
        }

        // Untimestamped messages are only delivered while no cursor exists,
        // so any scan that classified something must leave one behind.
        if newest.is_none() && !messages.is_empty() {
            newest = Some(now);
        }

        if let Some(newest) = newest.filter(|n| Some(*n) != cursor) {
            if let Err(e) = store.set_inbox_cursor(newest).await {
                warn!(error = %e, "Could not advance inbox cursor");
            }
        }

        if !messages.is_empty() {
            info!(count = messages.len(), "Classified inbound messages");
        }
        messages.len()
    }
}

#[async_trait]
impl PeriodicTask for SyncCycle {
    fn name(&self) -> &str {
        "scam-guard-sync"
    }

    async fn run(&self) {
        let report = self.run_cycle_at(crate::now_millis()).await;
        debug!(?report, "Sync cycle finished");
    }
}

impl std::fmt::Debug for SyncCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCycle")
            .field("store", &self.store)
            .field("has_source", &self.reconciler.is_some())
            .field("has_inbox", &self.inbox.is_some())
            .field("freshness_window", &self.freshness_window)
            .finish()
    }
}
