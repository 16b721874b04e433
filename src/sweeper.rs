//! Periodic eviction sweep
//!
//! Reconciles the destination directory with the store in two best-effort
//! phases:
//!
//! 1. Orphaned markers: a last-access marker whose file is gone is deleted
//!    (with its metadata key).
//! 2. Orphaned files: a media file without a live marker is deleted, unless a
//!    reader still holds it or a download for its hash is in flight.
//!
//! Only absence of a marker triggers eviction, so every file gets a grace
//! window equal to the marker TTL after its last request.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::content_hash;
use crate::keys;
use crate::lifecycle::FileLifecycle;
use crate::utils;

/// Counters from one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Markers removed because their file no longer exists
    pub orphaned_keys_removed: usize,
    /// Media files deleted because their marker expired
    pub files_evicted: usize,
    /// Unmarked files kept because they are being read or downloaded
    pub skipped_in_use: usize,
    /// Expired store rows physically removed
    pub expired_purged: u64,
    /// Individual failures that were logged and skipped
    pub errors: usize,
}

impl SweepReport {
    /// Whether the sweep changed anything on disk or in the store
    pub fn is_noop(&self) -> bool {
        self.orphaned_keys_removed == 0 && self.files_evicted == 0
    }
}

/// Eviction sweeper for one destination directory
#[derive(Debug, Clone)]
pub struct Sweeper {
    lifecycle: FileLifecycle,
    output_dir: PathBuf,
    media_extensions: Vec<String>,
    interval: Duration,
}

impl Sweeper {
    /// Build a sweeper from configuration
    pub fn new(config: &Config, lifecycle: FileLifecycle) -> Self {
        Self {
            lifecycle,
            output_dir: config.download.output_dir.clone(),
            media_extensions: config.download.media_extensions.clone(),
            interval: config.retention.sweep_interval,
        }
    }

    /// Run one sweep
    ///
    /// Never fails as a whole; individual failures are logged and counted in
    /// [`SweepReport::errors`].
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        self.remove_orphaned_markers(&mut report).await;
        self.evict_unmarked_files(&mut report).await;

        match self.lifecycle.store().purge_expired().await {
            Ok(purged) => report.expired_purged = purged,
            Err(e) => {
                tracing::warn!(error = %e, "failed to purge expired keys");
                report.errors += 1;
            }
        }

        if report.is_noop() {
            tracing::debug!(?report, "sweep finished");
        } else {
            tracing::info!(
                orphaned_keys_removed = report.orphaned_keys_removed,
                files_evicted = report.files_evicted,
                skipped_in_use = report.skipped_in_use,
                errors = report.errors,
                "sweep finished"
            );
        }
        report
    }

    async fn remove_orphaned_markers(&self, report: &mut SweepReport) {
        let store = self.lifecycle.store();
        let markers = match store.scan_prefix(keys::LAST_REQUEST_PREFIX).await {
            Ok(markers) => markers,
            Err(e) => {
                tracing::warn!(error = %e, "failed to scan last-access markers");
                report.errors += 1;
                return;
            }
        };

        for key in markers {
            let Some(path) = keys::path_from_last_request(&key) else {
                continue;
            };
            match tokio::fs::try_exists(path).await {
                Ok(true) => {}
                Ok(false) => {
                    let removed = store.del(&key).await;
                    let metadata = store.del(&keys::metadata(path)).await;
                    match removed.and(metadata) {
                        Ok(_) => {
                            tracing::debug!(path = %path.display(), "removed orphaned marker");
                            report.orphaned_keys_removed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "failed to remove orphaned marker");
                            report.errors += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to check marked file");
                    report.errors += 1;
                }
            }
        }
    }

    async fn evict_unmarked_files(&self, report: &mut SweepReport) {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(dir = %self.output_dir.display(), error = %e, "failed to read output directory");
                report.errors += 1;
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read directory entry");
                    report.errors += 1;
                    break;
                }
            };

            let path = entry.path();
            if !utils::is_media_file(&path, &self.media_extensions) {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                _ => continue,
            }

            match self.should_evict(&path).await {
                Ok(Verdict::Keep) => {}
                Ok(Verdict::InUse) => report.skipped_in_use += 1,
                Ok(Verdict::Evict) => match self.lifecycle.evict(&path).await {
                    Ok(true) => report.files_evicted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to evict file");
                        report.errors += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to inspect file");
                    report.errors += 1;
                }
            }
        }
    }

    async fn should_evict(&self, path: &Path) -> crate::Result<Verdict> {
        if self.lifecycle.is_marked(path).await? {
            return Ok(Verdict::Keep);
        }
        if self.lifecycle.ref_count(path).await? > 0 {
            tracing::debug!(path = %path.display(), "unmarked file still has readers");
            return Ok(Verdict::InUse);
        }
        if let Some(hash) = content_hash::hash_from_path(path)
            && self.lifecycle.store().exists(&keys::claim(&hash)).await?
        {
            tracing::debug!(path = %path.display(), "download in flight for unmarked file");
            return Ok(Verdict::InUse);
        }
        Ok(Verdict::Evict)
    }

    /// Run [`sweep`](Self::sweep) every configured interval until `cancel` fires
    ///
    /// The first sweep happens one interval after spawning.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut interval = tokio::time::interval_at(start, self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(interval_secs = self.interval.as_secs(), "eviction sweeper started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.sweep().await;
                    }
                    _ = cancel.cancelled() => {
                        tracing::info!("eviction sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}

enum Verdict {
    Keep,
    InUse,
    Evict,
}
