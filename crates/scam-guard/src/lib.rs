//! Offline scam-signal subsystem.
//!
//! This crate keeps a local cache of trusted senders and reported scammers
//! eventually consistent with a remote authority, and classifies inbound
//! messages against it without touching the network:
//!
//! - [`Reconciler`] - fetches both signal sets and replaces the local copy atomically
//! - [`SyncCycle`] / [`TaskRegistrar`] - periodic, freshness-gated sync and inbox scan
//! - [`MessageClassifier`] - format heuristic plus trust store lookups
//! - [`NotificationBus`] / [`WarningFeed`] - warning fan-out to the UI layer
//!
//! # Example
//!
//! ```no_run
//! use scam_guard::{GuardConfig, InboundMessage, ScamGuard};
//!
//! # async fn example() -> scam_guard::Result<()> {
//! let guard = ScamGuard::from_config(&GuardConfig::from_env()).await?;
//!
//! let _subscription = guard.bus().subscribe(|warning| {
//!     println!("warning: {}", warning);
//!     Ok(())
//! });
//!
//! let message = InboundMessage::new("+250 788 000 001", "You have received RWF 5,000");
//! let result = guard.classify(&message).await;
//! println!("{:?}", result.outcome);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod classifier;
pub mod config;
pub mod error;
pub mod inbox;
pub mod reconcile;
pub mod scheduler;
pub mod warnings;

pub use bus::{ListenerError, NotificationBus, Subscription};
pub use classifier::{
    Classification, ClassificationOutcome, FormatRules, MessageClassifier,
    FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER,
};
pub use config::GuardConfig;
pub use error::{GuardError, Result};
pub use inbox::{InboundMessage, JsonInbox, MemoryInbox, MessageSupplier};
pub use reconcile::{ReconcileSummary, Reconciler};
pub use scheduler::{
    needs_sync, CycleReport, PeriodicTask, SyncCycle, SyncOutcome, TaskHandle, TaskRegistrar,
    TokioRegistrar,
};
pub use warnings::{Warning, WarningFeed};

// Re-export the store and source crates for embedders.
pub use signal_source;
pub use trust_store;

use std::sync::Arc;

use signal_source::{HttpSignalSource, SignalSource};
use tracing::{info, warn};
use trust_store::{normalize, SignalSet, SyncMetadata, TrustStore};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Store and set sizes, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardStatus {
    pub metadata: SyncMetadata,
    pub trusted: i64,
    pub scammers: i64,
}

/// The assembled subsystem: one store handle shared by the classifier and
/// (when a remote authority is configured) the reconciler.
#[derive(Debug, Clone)]
pub struct ScamGuard {
    config: GuardConfig,
    store: TrustStore,
    bus: NotificationBus,
    classifier: MessageClassifier,
    reconciler: Option<Reconciler>,
}

impl ScamGuard {
    /// Connect to the configured store and wire up every component.
    pub async fn from_config(config: &GuardConfig) -> Result<Self> {
        let store = TrustStore::connect(&config.database_url)
            .await
            .map_err(GuardError::StorageOpenFailed)?;
        store
            .initialize()
            .await
            .map_err(GuardError::StorageOpenFailed)?;

        let source = match &config.source {
            Some(source_config) => {
                let http = HttpSignalSource::new(source_config.clone())
                    .map_err(|e| GuardError::Config(e.to_string()))?;
                let source: Arc<dyn SignalSource> = Arc::new(http);
                Some(source)
            }
            None => None,
        };

        Self::with_parts(config.clone(), store, source)
    }

    /// Wire components around an existing store and optional source.
    pub fn with_parts(
        config: GuardConfig,
        store: TrustStore,
        source: Option<Arc<dyn SignalSource>>,
    ) -> Result<Self> {
        let bus = NotificationBus::new();
        let classifier = MessageClassifier::new(store.clone(), bus.clone(), config.format_rules()?);
        let reconciler = source.map(|source| Reconciler::new(source, store.clone()));

        Ok(Self {
            config,
            store,
            bus,
            classifier,
            reconciler,
        })
    }

    pub fn store(&self) -> &TrustStore {
        &self.store
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn classifier(&self) -> &MessageClassifier {
        &self.classifier
    }

    /// Classify one inbound message, emitting its warnings.
    pub async fn classify(&self, message: &InboundMessage) -> Classification {
        self.classifier.classify(message).await
    }

    fn reconciler(&self) -> Result<&Reconciler> {
        self.reconciler
            .as_ref()
            .ok_or_else(|| GuardError::Config("SIGNAL_SOURCE_URL not set".to_string()))
    }

    /// Reconcile immediately, ignoring the freshness window.
    pub async fn sync_now(&self) -> Result<ReconcileSummary> {
        self.reconciler()?.force_sync().await
    }

    /// The periodic task body, with the configured inbox attached.
    ///
    /// Without a remote authority the cycle still scans the inbox.
    pub fn sync_cycle(&self) -> SyncCycle {
        let cycle = match &self.reconciler {
            Some(reconciler) => SyncCycle::new(reconciler.clone(), self.classifier.clone()),
            None => {
                warn!("No signal source configured, periodic sync disabled");
                SyncCycle::classify_only(self.store.clone(), self.classifier.clone())
            }
        };
        let mut cycle = cycle.with_freshness_window(self.config.freshness_window);

        if let Some(path) = &self.config.inbox_file {
            cycle = cycle.with_inbox(Arc::new(JsonInbox::new(path)));
        }

        cycle
    }

    /// Register the sync cycle with a host scheduler at the configured interval.
    pub fn schedule(&self, registrar: &dyn TaskRegistrar) -> TaskHandle {
        registrar.register_periodic(Arc::new(self.sync_cycle()), self.config.tick_interval)
    }

    /// Locally mark senders as trusted, without waiting for a sync.
    pub async fn mark_trusted(&self, raw: &[&str]) -> Result<u64> {
        self.merge(SignalSet::Trusted, raw).await
    }

    /// Locally report senders as scammers, without waiting for a sync.
    pub async fn report_scammer(&self, raw: &[&str]) -> Result<u64> {
        self.merge(SignalSet::Scammer, raw).await
    }

    async fn merge(&self, set: SignalSet, raw: &[&str]) -> Result<u64> {
        let identifiers: Vec<_> = raw.iter().map(|r| normalize(r)).collect();
        self.store
            .merge_into(set, &identifiers)
            .await
            .map_err(GuardError::StorageWriteFailed)
    }

    /// Sync metadata and set sizes.
    pub async fn status(&self) -> Result<GuardStatus> {
        let status = GuardStatus {
            metadata: self.store.metadata().await.map_err(GuardError::StorageReadFailed)?,
            trusted: self
                .store
                .count(SignalSet::Trusted)
                .await
                .map_err(GuardError::StorageReadFailed)?,
            scammers: self
                .store
                .count(SignalSet::Scammer)
                .await
                .map_err(GuardError::StorageReadFailed)?,
        };

        info!(
            trusted = status.trusted,
            scammers = status.scammers,
            last_sync = ?status.metadata.last_successful_sync_at,
            "Trust store status"
        );
        Ok(status)
    }
}

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
