//! Expiring key-value store
//!
//! All shared mutable state (task records, last-access markers, reference
//! counts, cached metadata, download claims) lives behind [`KvStore`]. Workers,
//! API handlers and the sweeper only touch it through the atomic operations
//! below, never through in-process locks, so several processes can share one
//! store.
//!
//! ## Implementations
//!
//! - [`SqliteStore`] - durable, backed by a SQLite file (sqlx); every
//!   read-modify-write is a single statement, so counters stay atomic across
//!   processes sharing the database.
//! - [`MemoryStore`] - in-process map, for tests and single-process use.

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Trait for an expiring key-value store
///
/// Expired keys are invisible to every operation: `get` returns `None`,
/// `exists` returns false, `incr_by` counts from zero and `set_nx` succeeds.
///
/// # Examples
///
/// ```no_run
/// use media_dl::store::{KvStore, MemoryStore};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> media_dl::Result<()> {
/// let store = MemoryStore::new();
/// store.set("greeting", "hello", Some(Duration::from_secs(60))).await?;
/// assert_eq!(store.get("greeting").await?.as_deref(), Some("hello"));
/// assert_eq!(store.incr("counter").await?, 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value and expiry
    ///
    /// `ttl = None` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Store `value` only if `key` is absent (or expired)
    ///
    /// Returns true if this call created the key.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Fetch the value of `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete `key`; returns true if a live key was removed
    async fn del(&self, key: &str) -> Result<bool>;

    /// Whether `key` is present and unexpired
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Atomically add `delta` to the integer stored at `key` and return the new value
    ///
    /// A missing key counts from 0. An existing expiry is preserved.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Atomically increment `key` by one
    async fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    /// Atomically decrement `key` by one
    async fn decr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, -1).await
    }

    /// Set an expiry on an existing key; returns false if the key is absent
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining time to live, or `None` if the key is absent or never expires
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// All live keys beginning with `prefix`, sorted
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Physically remove expired entries; returns how many were removed
    ///
    /// Stores that reclaim expired entries on their own may keep the default.
    async fn purge_expired(&self) -> Result<u64> {
        Ok(0)
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
