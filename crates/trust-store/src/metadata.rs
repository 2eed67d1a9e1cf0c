//! Key-value sync metadata.
//!
//! Values are epoch milliseconds and only ever move forward: writing an
//! older timestamp than the stored one leaves the stored one in place.
//! [`overwrite_timestamp`] is the one exception, for repairing a value
//! written under a clock that ran ahead.

use sqlx::{Executor, Sqlite};

use crate::error::StoreError;
use crate::Result;

/// Time of the last committed reconciliation.
pub const LAST_SYNC_TIME: &str = "last_sync_time";

/// Newest inbound message timestamp already classified.
pub const INBOX_CURSOR: &str = "inbox_cursor";

/// Read a timestamp value.
pub async fn get_timestamp<'e, E>(executor: E, key: &'static str) -> Result<Option<u64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let value = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT value
        FROM sync_metadata
        WHERE key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;

    value
        .map(|v| u64::try_from(v).map_err(|_| StoreError::Metadata { key, value: v }))
        .transpose()
}

/// Write a timestamp value, never moving it backwards.
pub async fn advance_timestamp<'e, E>(executor: E, key: &'static str, at: u64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let at = i64::try_from(at).unwrap_or(i64::MAX);

    sqlx::query(
        r#"
        INSERT INTO sync_metadata (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = MAX(value, excluded.value),
            updated_at = datetime('now')
        "#,
    )
    .bind(key)
    .bind(at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Write a timestamp value unconditionally.
pub async fn overwrite_timestamp<'e, E>(executor: E, key: &'static str, at: u64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let at = i64::try_from(at).unwrap_or(i64::MAX);

    sqlx::query(
        r#"
        INSERT INTO sync_metadata (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
    )
    .bind(key)
    .bind(at)
    .execute(executor)
    .await?;

    Ok(())
}
