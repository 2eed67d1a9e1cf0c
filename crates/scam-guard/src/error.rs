//! Guard error types.

use signal_source::SourceError;
use thiserror::Error;
use trust_store::StoreError;

/// Errors that can occur while syncing or classifying.
///
/// None of these reach the host process: the scheduler turns them into a
/// failed cycle and the classifier into a degraded result.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The remote authority could not provide both signal sets.
    #[error("signal sync unavailable: {0}")]
    SyncUnavailable(#[from] SourceError),

    /// The trust store could not be opened or migrated.
    #[error("trust store unavailable: {0}")]
    StorageOpenFailed(#[source] StoreError),

    /// The reconciliation transaction was rolled back.
    #[error("trust store write failed: {0}")]
    StorageWriteFailed(#[source] StoreError),

    /// A trust store read failed.
    #[error("trust store read failed: {0}")]
    StorageReadFailed(#[source] StoreError),

    /// The inbound message supplier failed.
    #[error("inbox error: {0}")]
    Inbox(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A classifier pattern failed to compile.
    #[error("invalid classifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
