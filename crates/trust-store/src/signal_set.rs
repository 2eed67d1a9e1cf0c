//! Signal set storage operations.

use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use crate::identifier::CanonicalIdentifier;
use crate::models::{SignalRecord, SignalSet};
use crate::Result;

/// Rows per multi-value INSERT, well under SQLite's bind parameter limit.
const INSERT_CHUNK: usize = 500;

/// Clear a set and insert the given identifiers.
///
/// Runs on a single connection so callers can compose it inside a
/// transaction. Duplicate identifiers are ignored. Returns the number of
/// rows inserted.
pub async fn replace_set<'a, I>(
    conn: &mut SqliteConnection,
    set: SignalSet,
    identifiers: I,
) -> Result<u64>
where
    I: IntoIterator<Item = &'a CanonicalIdentifier>,
{
    let identifiers: Vec<&CanonicalIdentifier> = identifiers.into_iter().collect();

    let cleared = sqlx::query(&format!("DELETE FROM {}", set.table()))
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let inserted = insert_identifiers(conn, set, &identifiers).await?;

    tracing::debug!(set = %set, cleared, inserted, "Replaced signal set");
    Ok(inserted)
}

/// Add identifiers to a set without removing existing entries.
pub async fn merge_into<'a, I>(
    conn: &mut SqliteConnection,
    set: SignalSet,
    identifiers: I,
) -> Result<u64>
where
    I: IntoIterator<Item = &'a CanonicalIdentifier>,
{
    let identifiers: Vec<&CanonicalIdentifier> = identifiers.into_iter().collect();
    insert_identifiers(conn, set, &identifiers).await
}

async fn insert_identifiers(
    conn: &mut SqliteConnection,
    set: SignalSet,
    identifiers: &[&CanonicalIdentifier],
) -> Result<u64> {
    let mut inserted = 0;

    for chunk in identifiers.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT OR IGNORE INTO {} (identifier) ", set.table()));
        builder.push_values(chunk, |mut row, identifier| {
            row.push_bind(identifier.as_str());
        });

        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

/// Check whether a canonical identifier is a member of a set.
pub async fn contains<'e, E>(
    executor: E,
    set: SignalSet,
    identifier: &CanonicalIdentifier,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT 1 FROM {} WHERE identifier = ?", set.table());
    let result = sqlx::query_scalar::<_, i32>(&sql)
        .bind(identifier.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(result.is_some())
}

/// Number of identifiers in a set.
pub async fn count<'e, E>(executor: E, set: SignalSet) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT COUNT(*) FROM {}", set.table());
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// All records in a set, ordered by identifier.
pub async fn list<'e, E>(executor: E, set: SignalSet) -> Result<Vec<SignalRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT identifier, created_at FROM {} ORDER BY identifier",
        set.table()
    );
    let records = sqlx::query_as::<_, SignalRecord>(&sql)
        .fetch_all(executor)
        .await?;

    Ok(records)
}
