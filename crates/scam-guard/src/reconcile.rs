//! Reconciliation of remote signal sets into the trust store.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use signal_source::SignalSource;
use tracing::{error, info, warn};
use trust_store::{normalize, CanonicalIdentifier, TrustStore};

use crate::error::{GuardError, Result};

/// What a committed reconciliation wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub trusted: u64,
    pub scammers: u64,
    pub synced_at: u64,
}

/// The only writer of the replicated signal sets.
#[derive(Clone)]
pub struct Reconciler {
    source: Arc<dyn SignalSource>,
    store: TrustStore,
}

fn canonical_set<'a>(raw: impl IntoIterator<Item = &'a String>) -> Vec<CanonicalIdentifier> {
    raw.into_iter()
        .map(|r| normalize(r))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl Reconciler {
    pub fn new(source: Arc<dyn SignalSource>, store: TrustStore) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &TrustStore {
        &self.store
    }

    /// Fetch both sets and replace the local copies, stamping `now` as the
    /// sync time.
    ///
    /// On any failure the store is left exactly as it was.
    pub async fn reconcile_at(&self, now: u64) -> Result<ReconcileSummary> {
        let sets = self.source.fetch_signal_sets().await.map_err(|e| {
            warn!(error = %e, "Signal sets unavailable, keeping local copy");
            GuardError::SyncUnavailable(e)
        })?;

        let trusted = canonical_set(&sets.trusted);
        let scammers = canonical_set(&sets.scammers);

        let counts = self
            .store
            .apply_reconciliation(&trusted, &scammers, now)
            .await
            .map_err(|e| {
                error!(error = %e, "Reconciliation rolled back");
                GuardError::StorageWriteFailed(e)
            })?;

        info!(
            trusted = counts.trusted,
            scammers = counts.scammers,
            synced_at = now,
            "Reconciled signal sets"
        );

        Ok(ReconcileSummary {
            trusted: counts.trusted,
            scammers: counts.scammers,
            synced_at: now,
        })
    }

    /// Reconcile now, regardless of freshness.
    pub async fn force_sync(&self) -> Result<ReconcileSummary> {
        self.reconcile_at(crate::now_millis()).await
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_source::{async_trait, SignalSets, SourceError};
    use trust_store::SignalSet;

    struct FixedSource(SignalSets);

    #[async_trait]
    impl SignalSource for FixedSource {
        async fn fetch_signal_sets(&self) -> std::result::Result<SignalSets, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn sets(trusted: &[&str], scammers: &[&str]) -> SignalSets {
        SignalSets {
            trusted: trusted.iter().map(|s| s.to_string()).collect(),
            scammers: scammers.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn test_store() -> TrustStore {
        let store = TrustStore::connect("sqlite::memory:").await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[test]
    fn test_canonical_set_dedupes_after_normalizing() {
        let raw = sets(&["+250 788 000 001", "0788000001", "788000001", "0788000002"], &[]);
        let canonical = canonical_set(&raw.trusted);
        assert_eq!(canonical.len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_normalizes_before_storing() {
        let store = test_store().await;
        let source = FixedSource(sets(&["+250 788 000 001"], &["(078) 899-9999"]));
        let reconciler = Reconciler::new(Arc::new(source), store.clone());

        let summary = reconciler.reconcile_at(1_000).await.unwrap();
        assert_eq!(summary.trusted, 1);
        assert_eq!(summary.scammers, 1);

        let trusted = store.list(SignalSet::Trusted).await.unwrap();
        assert_eq!(trusted[0].identifier, "788000001");
        assert!(store.contains(SignalSet::Scammer, &normalize("0788999999")).await);
        assert_eq!(store.last_sync_time().await.unwrap(), Some(1_000));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let store = test_store().await;
        let reconciler = Reconciler::new(Arc::new(FixedSource(sets(&["1"], &["2"]))), store.clone());
        store.close().await;

        let result = reconciler.reconcile_at(1_000).await;
        assert!(matches!(result, Err(GuardError::StorageWriteFailed(_))));
    }
}
