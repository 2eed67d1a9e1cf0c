//! Trust store error types.

use thiserror::Error;

/// Errors that can occur during trust store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLx error (connection, query, closed pool, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A metadata value could not be interpreted
    #[error("invalid metadata value for {key}: {value}")]
    Metadata { key: &'static str, value: i64 },
}

/// Result type for trust store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
