//! SQLite-backed store: lifecycle, schema migrations and operations.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::KvStore;
use crate::error::StoreError;
use crate::{Error, Result};

/// Durable [`KvStore`] on a SQLite file
///
/// Expiry is stored as a unix timestamp in milliseconds; expired rows are
/// filtered out of every read and physically removed by
/// [`KvStore::purge_expired`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn query_failed(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Store(StoreError::QueryFailed(format!("{}: {}", context, e)))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now_millis().saturating_add(ttl.as_millis() as i64))
}

impl SqliteStore {
    /// Open (or create) the store at `path` and run migrations
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Store(StoreError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Store(StoreError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(query_failed("Failed to query schema version"))?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: key-value table with optional expiry
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying store migration v1");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to create kv table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv(expires_at)")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Store(StoreError::MigrationFailed(format!(
                    "Failed to create expiry index: {}",
                    e
                )))
            })?;

        Self::record_migration(conn, 1).await
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Store(StoreError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;

        tracing::info!(version, "Store migration applied");
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to set key"))?;

        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        // The upsert only overwrites a row that has already expired
        let result = sqlx::query(
            r#"
            INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            WHERE kv.expires_at IS NOT NULL AND kv.expires_at <= ?4
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to set key if absent"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM kv
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
            "#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to get key"))?;

        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removed: Option<Option<i64>> =
            sqlx::query_scalar("DELETE FROM kv WHERE key = ?1 RETURNING expires_at")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed("Failed to delete key"))?;

        let now = now_millis();
        Ok(matches!(removed, Some(expiry) if expiry.is_none_or(|at| at > now)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM kv
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
            "#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to check key"))?;

        Ok(found.is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        // An expired row restarts from zero and loses its expiry
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
            ON CONFLICT(key) DO UPDATE SET
                value = CASE
                    WHEN kv.expires_at IS NOT NULL AND kv.expires_at <= ?3 THEN ?2
                    ELSE CAST(kv.value AS INTEGER) + ?2
                END,
                expires_at = CASE
                    WHEN kv.expires_at IS NOT NULL AND kv.expires_at <= ?3 THEN NULL
                    ELSE kv.expires_at
                END
            WHERE kv.expires_at IS NOT NULL AND kv.expires_at <= ?3
                OR CAST(kv.value AS INTEGER) || '' = kv.value
            RETURNING CAST(value AS INTEGER)
            "#,
        )
        .bind(key)
        .bind(delta)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to increment key"))?;

        // No row back means the live value is not an integer
        value.ok_or_else(|| {
            Error::Store(StoreError::InvalidValue {
                key: key.to_string(),
                reason: "not an integer".to_string(),
            })
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = now_millis();
        let result = sqlx::query(
            r#"
            UPDATE kv SET expires_at = ?2
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?3)
            "#,
        )
        .bind(key)
        .bind(now.saturating_add(ttl.as_millis() as i64))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to set expiry"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = now_millis();
        let expires_at: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            SELECT expires_at FROM kv
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
            "#,
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to read expiry"))?;

        Ok(expires_at
            .flatten()
            .map(|at| Duration::from_millis(at.saturating_sub(now).max(0) as u64)))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        // substr comparison avoids LIKE wildcard escaping for paths with '%' or '_'
        let keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT key FROM kv
            WHERE substr(key, 1, length(?1)) = ?1
                AND (expires_at IS NULL OR expires_at > ?2)
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .bind(now_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to scan keys"))?;

        Ok(keys)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1")
                .bind(now_millis())
                .execute(&self.pool)
                .await
                .map_err(query_failed("Failed to purge expired keys"))?;

        Ok(result.rows_affected())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
