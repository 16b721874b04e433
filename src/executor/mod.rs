//! Acquisition executor
//!
//! Turns a source URL into a file in the destination directory, reusing an
//! existing file when one with the URL's content hash is already there.
//!
//! ## Architecture
//!
//! The external tool sits behind the [`MediaFetcher`] trait:
//!
//! - [`CliFetcher`]: runs a yt-dlp compatible binary
//! - [`NoOpFetcher`]: used when the tool is missing; every call fails with
//!   installation instructions
//!
//! [`Acquirer`] owns the steps around the tool: directory setup, the cache
//! scan, the in-flight claim that keeps two workers from downloading the same
//! URL at once, locating the final file and refreshing markers and metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::content_hash;
use crate::error::{AcquireError, Result};
use crate::keys;
use crate::lifecycle::FileLifecycle;
use crate::store::KvStore;
use crate::types::{AcquiredMedia, MediaMetadata};

mod cli;
pub mod finalize;
pub mod metadata;
mod noop;
mod traits;

pub use cli::CliFetcher;
pub use noop::NoOpFetcher;
pub use traits::MediaFetcher;

/// Pick the fetcher for the configured tool
///
/// An explicit `tool_path` wins; otherwise `PATH` is searched when enabled.
/// Falls back to [`NoOpFetcher`] so a missing tool fails tasks, not startup.
pub fn select_fetcher(config: &Config) -> Arc<dyn MediaFetcher> {
    let tools = &config.tools;
    if let Some(path) = &tools.tool_path {
        tracing::info!(path = %path.display(), "using configured download tool");
        return Arc::new(CliFetcher::new(path.clone()));
    }
    if tools.search_path
        && let Some(fetcher) = CliFetcher::from_path(&tools.tool_name)
    {
        tracing::info!(path = %fetcher.binary_path().display(), "found download tool in PATH");
        return Arc::new(fetcher);
    }
    tracing::warn!(tool = %tools.tool_name, "download tool not found; acquisitions will fail");
    Arc::new(NoOpFetcher::new(tools.tool_name.clone()))
}

/// Cache-or-download acquisition of one URL
#[derive(Clone)]
pub struct Acquirer {
    fetcher: Arc<dyn MediaFetcher>,
    lifecycle: FileLifecycle,
    output_dir: PathBuf,
    extension: String,
    claim_ttl: Duration,
    finalize_timeout: Duration,
    poll_interval: Duration,
}

impl Acquirer {
    /// Build an acquirer from configuration
    pub fn new(config: &Config, fetcher: Arc<dyn MediaFetcher>, lifecycle: FileLifecycle) -> Self {
        Self {
            fetcher,
            lifecycle,
            output_dir: config.download.output_dir.clone(),
            extension: config.download.media_extension.clone(),
            claim_ttl: config.retention.claim_ttl,
            finalize_timeout: config.tools.finalize_timeout,
            poll_interval: config.tools.finalize_poll_interval,
        }
    }

    fn store(&self) -> &Arc<dyn KvStore> {
        self.lifecycle.store()
    }

    /// Destination directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Acquire `url`: return the cached file if present, otherwise download it
    ///
    /// Metadata problems on a cache hit never fail the call; the file is
    /// returned with whatever metadata could be recovered.
    pub async fn acquire(&self, url: &str) -> Result<AcquiredMedia> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| self.dir_unavailable(e))?;

        self.fetcher.ensure_available().await?;

        let hash = content_hash::hash_url(url);

        let claim = loop {
            if let Some(path) = self.find_cached(&hash).await? {
                return self.cache_hit(url, path).await;
            }
            if let Some(claim) = Claim::take(self.store(), &hash, self.claim_ttl).await? {
                break claim;
            }
            tracing::debug!(hash = %hash, "download of same content in flight, waiting");
            tokio::time::sleep(self.poll_interval).await;
        };

        let result = self.download(url, &hash).await;
        claim.release().await;
        result
    }

    /// Final file for `hash` in the destination directory, if any
    pub async fn find_cached(&self, hash: &str) -> Result<Option<PathBuf>> {
        let scan = finalize::scan_for_hash(&self.output_dir, hash, &self.extension)
            .await
            .map_err(|e| self.dir_unavailable(e))?;
        Ok(scan.final_file)
    }

    async fn cache_hit(&self, url: &str, path: PathBuf) -> Result<AcquiredMedia> {
        tracing::debug!(path = %path.display(), "cache hit");
        self.lifecycle.touch(&path).await?;

        let cached = match self.lifecycle.load_metadata(&path).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read cached metadata");
                None
            }
        };

        let metadata = match cached {
            Some(metadata) => metadata,
            None => match self.fetcher.fetch_metadata(url).await {
                Ok(metadata) => {
                    self.persist_metadata(&path, &metadata).await;
                    metadata
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "metadata fetch failed, returning file without it");
                    MediaMetadata::default()
                }
            },
        };

        Ok(AcquiredMedia {
            file_path: path,
            metadata,
            cache_hit: true,
        })
    }

    async fn download(&self, url: &str, hash: &str) -> Result<AcquiredMedia> {
        let template = self
            .output_dir
            .join(format!("%(title)s_{}.%(ext)s", hash))
            .to_string_lossy()
            .into_owned();

        tracing::info!(url, hash, tool = self.fetcher.name(), "downloading media");
        let metadata = self
            .fetcher
            .download(url, &template, &self.extension)
            .await?;

        // The title part of the name is only known once the tool has written the file
        let path = match self.find_cached(hash).await? {
            Some(path) => path,
            None => {
                finalize::wait_for_final_file(
                    &self.output_dir,
                    hash,
                    &self.extension,
                    self.finalize_timeout,
                    self.poll_interval,
                )
                .await?
            }
        };

        self.lifecycle.touch(&path).await?;
        self.persist_metadata(&path, &metadata).await;

        tracing::info!(path = %path.display(), "download finished");
        Ok(AcquiredMedia {
            file_path: path,
            metadata,
            cache_hit: false,
        })
    }

    async fn persist_metadata(&self, path: &Path, metadata: &MediaMetadata) {
        if let Err(e) = self.lifecycle.store_metadata(path, metadata).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to cache metadata");
        }
    }

    fn dir_unavailable(&self, e: std::io::Error) -> crate::Error {
        AcquireError::DirectoryUnavailable {
            path: self.output_dir.clone(),
            reason: e.to_string(),
        }
        .into()
    }
}

impl std::fmt::Debug for Acquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("fetcher", &self.fetcher.name())
            .field("output_dir", &self.output_dir)
            .field("extension", &self.extension)
            .finish()
    }
}

/// Exclusive right to download one content hash
///
/// Released explicitly after the download, or on drop when the acquisition
/// future is cancelled mid-download.
struct Claim {
    store: Arc<dyn KvStore>,
    key: String,
    token: String,
    released: bool,
}

impl Claim {
    async fn take(store: &Arc<dyn KvStore>, hash: &str, ttl: Duration) -> Result<Option<Self>> {
        let key = keys::claim(hash);
        let token = uuid::Uuid::new_v4().to_string();
        if store.set_nx(&key, &token, Some(ttl)).await? {
            Ok(Some(Self {
                store: store.clone(),
                key,
                token,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    async fn release(mut self) {
        self.released = true;
        release_claim(&self.store, &self.key, &self.token).await;
    }
}

async fn release_claim(store: &Arc<dyn KvStore>, key: &str, token: &str) {
    // Only drop the claim if it is still ours (it may have expired and been re-taken)
    match store.get(key).await {
        Ok(Some(current)) if current == token => {
            if let Err(e) = store.del(key).await {
                tracing::warn!(key, error = %e, "failed to release download claim");
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(key, error = %e, "failed to read download claim"),
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { release_claim(&store, &key, &token).await });
        }
    }
}
