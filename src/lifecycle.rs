//! Reference-counted file lifecycle
//!
//! Each media file has three keys in the shared store:
//!
//! - a last-access marker (`media:lastrequest:<path>`), refreshed on every
//!   request that resolves to the file; while present the file is not evicted
//! - cached metadata (`media:metadata:<path>`), same TTL as the marker
//! - a reader count (`media:refcount:<path>`), incremented while a client is
//!   receiving the file
//!
//! Counts are only changed with the store's atomic increment/decrement, so two
//! concurrent releases can never both observe the same value.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::RetentionConfig;
use crate::error::Result;
use crate::keys;
use crate::store::KvStore;
use crate::types::{Event, MediaMetadata};

/// What a release did
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other readers remain
    Retained {
        /// Readers still holding the file
        remaining: i64,
    },
    /// Last reader left; the file stays cached until its marker expires
    Released,
    /// Last reader left after the marker expired; the file was removed
    Deleted,
    /// The count went below zero (a double release somewhere)
    Underflow {
        /// Count observed after the decrement
        count: i64,
    },
}

/// Reference counting, markers and metadata for media files
#[derive(Clone)]
pub struct FileLifecycle {
    store: Arc<dyn KvStore>,
    marker_ttl: Duration,
    ref_guard_ttl: Duration,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl FileLifecycle {
    /// Create a lifecycle over `store` using the configured retention windows
    pub fn new(store: Arc<dyn KvStore>, retention: &RetentionConfig) -> Self {
        Self {
            store,
            marker_ttl: retention.task_retention,
            ref_guard_ttl: retention.ref_guard_ttl,
            event_tx: None,
        }
    }

    /// Emit [`Event::Evicted`] on `tx` whenever a file is removed
    pub fn with_events(mut self, tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Refresh the last-access marker of `path`
    pub async fn touch(&self, path: &Path) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.store
            .set(&keys::last_request(path), &now, Some(self.marker_ttl))
            .await
    }

    /// Whether `path` currently has a last-access marker
    pub async fn is_marked(&self, path: &Path) -> Result<bool> {
        self.store.exists(&keys::last_request(path)).await
    }

    /// Cached metadata for `path`, if any
    pub async fn load_metadata(&self, path: &Path) -> Result<Option<MediaMetadata>> {
        match self.store.get(&keys::metadata(path)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Cache metadata for `path` with the marker TTL
    pub async fn store_metadata(&self, path: &Path, metadata: &MediaMetadata) -> Result<()> {
        let json = serde_json::to_string(metadata)?;
        self.store
            .set(&keys::metadata(path), &json, Some(self.marker_ttl))
            .await
    }

    /// Current reader count (0 when absent)
    pub async fn ref_count(&self, path: &Path) -> Result<i64> {
        match self.store.get(&keys::refcount(path)).await? {
            Some(value) => Ok(value.trim().parse().unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Register a reader of `path`; returns the new count
    ///
    /// The first reader puts an expiry guard on the count so a reader that
    /// never releases cannot pin the file forever.
    pub async fn acquire(&self, path: &Path) -> Result<i64> {
        let key = keys::refcount(path);
        let count = self.store.incr(&key).await?;
        if count == 1 {
            self.store.expire(&key, self.ref_guard_ttl).await?;
        }
        tracing::debug!(path = %path.display(), count, "file reference acquired");
        Ok(count)
    }

    /// Register a reader and return a guard that releases on drop
    pub async fn lease(&self, path: &Path) -> Result<FileLease> {
        self.acquire(path).await?;
        Ok(FileLease {
            lifecycle: self.clone(),
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Unregister a reader of `path`
    ///
    /// When the count reaches zero and the last-access marker has already
    /// expired, the file and its metadata are deleted. A file that is already
    /// gone counts as deleted; other deletion failures are logged only, since
    /// the caller has already delivered the file.
    pub async fn release(&self, path: &Path) -> Result<ReleaseOutcome> {
        let key = keys::refcount(path);
        let count = self.store.decr(&key).await?;

        if count > 0 {
            tracing::debug!(path = %path.display(), remaining = count, "file reference released");
            return Ok(ReleaseOutcome::Retained { remaining: count });
        }

        if count < 0 {
            tracing::error!(
                path = %path.display(),
                count,
                "reference count went negative (double release)"
            );
            // Undo only our own excess so concurrent acquirers keep their counts
            self.store.incr_by(&key, -count).await?;
            self.store.expire(&key, self.ref_guard_ttl).await?;
        }

        let deleted = if self.is_marked(path).await? {
            false
        } else {
            self.remove_file(path).await
        };

        Ok(match (count < 0, deleted) {
            (true, _) => ReleaseOutcome::Underflow { count },
            (false, true) => ReleaseOutcome::Deleted,
            (false, false) => ReleaseOutcome::Released,
        })
    }

    /// Remove `path` with its marker and metadata keys, regardless of readers
    ///
    /// Returns true if the file was present. Used by the sweeper after it has
    /// checked the count itself.
    pub async fn evict(&self, path: &Path) -> Result<bool> {
        let existed = match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        self.store.del(&keys::metadata(path)).await?;
        self.store.del(&keys::last_request(path)).await?;

        if existed {
            tracing::info!(path = %path.display(), "evicted media file");
            self.emit(Event::Evicted {
                path: path.to_path_buf(),
            });
        }
        Ok(existed)
    }

    async fn remove_file(&self, path: &Path) -> bool {
        match self.evict(path).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete released file");
                false
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            // No receivers is fine
            let _ = tx.send(event);
        }
    }
}

impl std::fmt::Debug for FileLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLifecycle")
            .field("store", &self.store.name())
            .field("marker_ttl", &self.marker_ttl)
            .field("ref_guard_ttl", &self.ref_guard_ttl)
            .finish()
    }
}

/// A registered reader of a media file
///
/// Dropping the lease releases the reference on the current tokio runtime;
/// call [`FileLease::release`] to release it in place and see the outcome.
pub struct FileLease {
    lifecycle: FileLifecycle,
    path: PathBuf,
    released: bool,
}

impl FileLease {
    /// File this lease protects
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the reference now
    pub async fn release(mut self) -> Result<ReleaseOutcome> {
        self.released = true;
        self.lifecycle.release(&self.path).await
    }
}

impl std::fmt::Debug for FileLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLease")
            .field("path", &self.path)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let lifecycle = self.lifecycle.clone();
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = lifecycle.release(&path).await {
                        tracing::error!(path = %path.display(), error = %e, "failed to release file lease");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    "file lease dropped outside a runtime; count held until its guard expires"
                );
            }
        }
    }
}
