//! PostgreSQL Row Store
//!
//! Keeps one row per cache entry in an adapter-named table:
//! `key` primary key, JSONB `value`, `expiration` in Unix milliseconds
//! (0 = never) and `create_time`/`update_time` audit columns.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::pool::Pool;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::Postgres;
use tracing::{debug, info};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};
use crate::persistence::PersistenceAdapter;

/// PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

/// Longest identifier PostgreSQL keeps without truncation
const MAX_TABLE_NAME_LENGTH: usize = 63;

type RowTuple = (
    String,
    Option<serde_json::Value>,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

// == Persisted Row ==
/// A cache entry as stored in the table.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRow {
    /// Cache key
    pub key: String,
    /// Decoded payload, NULL rows are skipped on load
    pub value: Option<serde_json::Value>,
    /// Expiration timestamp (Unix milliseconds), 0 = no expiration
    pub expiration: u64,
    /// First insert
    pub create_time: DateTime<Utc>,
    /// Last upsert
    pub update_time: DateTime<Utc>,
}

impl PersistedRow {
    fn from_tuple(row: RowTuple) -> Self {
        Self {
            key: row.0,
            value: row.1,
            expiration: u64::try_from(row.2).unwrap_or(0),
            create_time: row.3,
            update_time: row.4,
        }
    }

    /// Converts the row back into a cache entry; `None` for a NULL value.
    pub fn into_entry(self) -> Result<Option<(String, CacheEntry)>> {
        let Some(value) = self.value else {
            return Ok(None);
        };
        let entry = CacheEntry {
            payload: serde_json::to_vec(&value)?,
            expiration: self.expiration,
        };
        Ok(Some((self.key, entry)))
    }
}

// == Row Store ==
/// [`PersistenceAdapter`] over a PostgreSQL table.
#[derive(Debug, Clone)]
pub struct PgRowStore {
    pool: PgPool,
    table: String,
}

impl PgRowStore {
    /// Binds to `table`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is not a plain identifier or the
    /// table cannot be created.
    pub async fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;

        let store = Self { pool, table };
        store.ensure_table().await?;
        Ok(store)
    }

    /// The backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_table(&self) -> Result<()> {
        let sql = create_table_sql(&self.table);
        query(&sql).execute(&self.pool).await.map_err(db_error)?;

        info!(table = %self.table, "Database cache table ready");
        Ok(())
    }

    /// Fetches every row that is still live at `now`.
    pub async fn live_rows(&self, now: u64) -> Result<Vec<PersistedRow>> {
        let sql = format!(
            r#"
            SELECT key, value, expiration, create_time, update_time
            FROM "{}"
            WHERE value IS NOT NULL
              AND (expiration = 0 OR expiration > $1)
            "#,
            self.table
        );
        let rows: Vec<RowTuple> = query_as(&sql)
            .bind(to_db_millis(now))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(PersistedRow::from_tuple).collect())
    }
}

#[async_trait]
impl PersistenceAdapter for PgRowStore {
    async fn load_all(&self) -> Result<HashMap<String, CacheEntry>> {
        let rows = self.live_rows(crate::cache::current_timestamp_ms()).await?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some((key, entry)) = row.into_entry()? {
                entries.insert(key, entry);
            }
        }
        Ok(entries)
    }

    async fn save_entry(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let value: serde_json::Value = serde_json::from_slice(&entry.payload)?;
        let sql = format!(
            r#"
            INSERT INTO "{}" (key, value, expiration)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                expiration = EXCLUDED.expiration,
                update_time = now()
            "#,
            self.table
        );
        query(&sql)
            .bind(key)
            .bind(value)
            .bind(to_db_millis(entry.expiration))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> Result<()> {
        let sql = format!(r#"DELETE FROM "{}" WHERE key = $1"#, self.table);
        query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn purge_expired(&self, now: u64) -> Result<u64> {
        let sql = format!(
            r#"DELETE FROM "{}" WHERE expiration != 0 AND expiration <= $1"#,
            self.table
        );
        let result = query(&sql)
            .bind(to_db_millis(now))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        debug!(table = %self.table, purged = result.rows_affected(), "Purged expired rows");
        Ok(result.rows_affected())
    }
}

/// Keys are unbounded TEXT so any key the cache accepts can be stored.
fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{}" (
            key         TEXT PRIMARY KEY,
            value       JSONB,
            expiration  BIGINT NOT NULL DEFAULT 0,
            create_time TIMESTAMPTZ NOT NULL DEFAULT now(),
            update_time TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        table
    )
}

/// Accepts plain identifiers only, since the name is spliced into SQL.
fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= MAX_TABLE_NAME_LENGTH {
        Ok(())
    } else {
        Err(CacheError::InvalidRequest(format!(
            "invalid table name '{}'",
            name
        )))
    }
}

fn to_db_millis(millis: u64) -> i64 {
    i64::try_from(millis).unwrap_or(i64::MAX)
}

fn db_error(e: sqlx_core::Error) -> CacheError {
    CacheError::Persistence(e.to_string())
}
