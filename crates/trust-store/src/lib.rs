//! Offline trust store for Scam Guard.
//!
//! This crate persists the two signal sets (trusted senders and reported
//! scammers) plus sync metadata in SQLite using SQLx. Every identifier is
//! canonicalized with [`normalize`] before it is stored or looked up.
//!
//! # Example
//!
//! ```no_run
//! use trust_store::{normalize, SignalSet, TrustStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and create the schema
//!     let store = TrustStore::connect("sqlite:scam-guard.db?mode=rwc").await?;
//!     store.initialize().await?;
//!
//!     // Hot-path lookup, never fails
//!     let sender = normalize("+250 784 310 609");
//!     let trusted = store.contains(SignalSet::Trusted, &sender).await;
//!     println!("trusted: {}", trusted);
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod identifier;
pub mod metadata;
pub mod models;
pub mod signal_set;

pub use error::{Result, StoreError};
pub use identifier::{normalize, CanonicalIdentifier, CANONICAL_LEN};
pub use models::{ReconcileCounts, SignalRecord, SignalSet, SyncMetadata};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Handle to the trust store.
///
/// Cheap to clone; clones share one connection pool. Construct it once at
/// process start and pass it to whatever needs it.
#[derive(Debug, Clone)]
pub struct TrustStore {
    pool: SqlitePool,
}

impl TrustStore {
    /// Default pool size. Reads from classification run alongside a sync
    /// transaction, so keep more than one connection.
    const DEFAULT_POOL_SIZE: u32 = 4;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        // WAL lets lookups read the last committed sets while a sync writes.
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to trust store: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet.
    ///
    /// Idempotent; call it on every process start.
    pub async fn initialize(&self) -> Result<()> {
        tracing::debug!("Initializing trust store schema");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool. Subsequent reads fail closed.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Replace both signal sets and record the sync time in one transaction.
    ///
    /// Either all three writes commit or none of them do.
    pub async fn apply_reconciliation(
        &self,
        trusted: &[CanonicalIdentifier],
        scammers: &[CanonicalIdentifier],
        synced_at: u64,
    ) -> Result<ReconcileCounts> {
        let mut tx = self.pool.begin().await?;

        let trusted = signal_set::replace_set(&mut tx, SignalSet::Trusted, trusted).await?;
        let scammers = signal_set::replace_set(&mut tx, SignalSet::Scammer, scammers).await?;
        metadata::advance_timestamp(&mut *tx, metadata::LAST_SYNC_TIME, synced_at).await?;

        tx.commit().await?;

        Ok(ReconcileCounts { trusted, scammers })
    }

    /// Add identifiers to a set, keeping everything already there.
    pub async fn merge_into(
        &self,
        set: SignalSet,
        identifiers: &[CanonicalIdentifier],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let inserted = signal_set::merge_into(&mut tx, set, identifiers).await?;
        tx.commit().await?;

        tracing::info!(set = %set, inserted, "Merged identifiers into signal set");
        Ok(inserted)
    }

    /// Membership lookup that fails closed.
    ///
    /// A storage error is logged and reported as "not a member" so callers
    /// on the classification path never see an error.
    pub async fn contains(&self, set: SignalSet, identifier: &CanonicalIdentifier) -> bool {
        match self.try_contains(set, identifier).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(set = %set, error = %e, "Trust store read failed, assuming unknown");
                false
            }
        }
    }

    /// Membership lookup that surfaces storage errors.
    pub async fn try_contains(
        &self,
        set: SignalSet,
        identifier: &CanonicalIdentifier,
    ) -> Result<bool> {
        signal_set::contains(&self.pool, set, identifier).await
    }

    /// Number of identifiers in a set.
    pub async fn count(&self, set: SignalSet) -> Result<i64> {
        signal_set::count(&self.pool, set).await
    }

    /// All records in a set.
    pub async fn list(&self, set: SignalSet) -> Result<Vec<SignalRecord>> {
        signal_set::list(&self.pool, set).await
    }

    /// Epoch millis of the last committed reconciliation.
    pub async fn last_sync_time(&self) -> Result<Option<u64>> {
        metadata::get_timestamp(&self.pool, metadata::LAST_SYNC_TIME).await
    }

    /// Record a sync time outside of a reconciliation.
    pub async fn set_last_sync_time(&self, at: u64) -> Result<()> {
        metadata::advance_timestamp(&self.pool, metadata::LAST_SYNC_TIME, at).await
    }

    /// Replace a last sync time that lies in the future.
    ///
    /// Only lowers the stored value when it is later than `at`.
    pub async fn rewind_last_sync_time(&self, at: u64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let stored = metadata::get_timestamp(&mut *tx, metadata::LAST_SYNC_TIME).await?;
        if stored.is_some_and(|stored| stored > at) {
            metadata::overwrite_timestamp(&mut *tx, metadata::LAST_SYNC_TIME, at).await?;
            tracing::warn!(stored = ?stored, at, "Rewound future last sync time");
        }
        tx.commit().await?;
        Ok(())
    }

    /// Current sync metadata.
    pub async fn metadata(&self) -> Result<SyncMetadata> {
        Ok(SyncMetadata {
            last_successful_sync_at: self.last_sync_time().await?,
        })
    }

    /// Timestamp of the newest inbound message already classified.
    pub async fn inbox_cursor(&self) -> Result<Option<u64>> {
        metadata::get_timestamp(&self.pool, metadata::INBOX_CURSOR).await
    }

    /// Advance the inbound message cursor.
    pub async fn set_inbox_cursor(&self, at: u64) -> Result<()> {
        metadata::advance_timestamp(&self.pool, metadata::INBOX_CURSOR, at).await
    }
}
