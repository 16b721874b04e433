//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::error::{AcquireError, Result};
use crate::executor::MediaFetcher;
use crate::store::{KvStore, SqliteStore};
use crate::types::{MediaMetadata, TaskId, TaskRecord, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Semaphore;

/// In-process download tool
///
/// Writes `<title>_<hash>.<ext>` by filling in the output template. With a
/// gate, each download waits for one permit so tests can hold jobs in
/// `processing`.
#[derive(Default)]
pub(crate) struct TestFetcher {
    pub(crate) downloads: AtomicUsize,
    pub(crate) fail_with: Option<String>,
    pub(crate) gate: Option<Arc<Semaphore>>,
}

impl TestFetcher {
    /// Fetcher whose downloads block until `gate` hands out permits
    pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    /// Fetcher whose downloads exit non-zero with `stderr`
    pub(crate) fn failing(stderr: &str) -> Self {
        Self {
            fail_with: Some(stderr.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for TestFetcher {
    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    async fn download(
        &self,
        _url: &str,
        output_template: &str,
        container: &str,
    ) -> Result<MediaMetadata> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(stderr) = &self.fail_with {
            return Err(AcquireError::ToolFailed {
                exit_code: Some(1),
                stderr: stderr.clone(),
            }
            .into());
        }
        let path = output_template
            .replace("%(title)s", "Test Clip")
            .replace("%(ext)s", container);
        tokio::fs::write(path, b"test media bytes").await?;
        Ok(MediaMetadata {
            title: Some("Test Clip".into()),
            thumbnail_url: Some("https://img.example.com/medium.jpg".into()),
            duration: Some("1:05".into()),
        })
    }

    async fn fetch_metadata(&self, _url: &str) -> Result<MediaMetadata> {
        Ok(MediaMetadata::default())
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

/// Config rooted in `dir` with a small worker pool
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("test.db");
    config.download.output_dir = dir.join("downloads");
    config.download.max_concurrent_downloads = 3;
    config.tools.finalize_timeout = Duration::from_millis(500);
    config.tools.finalize_poll_interval = Duration::from_millis(10);
    config
}

/// Helper to create a test MediaDownloader with a persistent store and an
/// in-process fetcher. Returns the downloader and the tempdir (which must be
/// kept alive).
pub(crate) async fn create_test_downloader() -> (MediaDownloader, tempfile::TempDir) {
    let (downloader, _fetcher, temp_dir) =
        create_test_downloader_with(TestFetcher::default(), |_| {}).await;
    (downloader, temp_dir)
}

/// Like [`create_test_downloader`] with a chosen fetcher and config tweaks
pub(crate) async fn create_test_downloader_with(
    fetcher: TestFetcher,
    configure: impl FnOnce(&mut Config),
) -> (MediaDownloader, Arc<TestFetcher>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    std::fs::create_dir_all(&config.download.output_dir).unwrap();

    let store: Arc<dyn KvStore> = Arc::new(
        SqliteStore::new(&config.persistence.database_path)
            .await
            .unwrap(),
    );
    let fetcher = Arc::new(fetcher);
    let downloader = MediaDownloader::with_components(config, store, fetcher.clone()).unwrap();

    (downloader, fetcher, temp_dir)
}

/// Poll until the task reaches `status`, panicking after five seconds
pub(crate) async fn wait_for_status(
    downloader: &MediaDownloader,
    id: &TaskId,
    status: TaskStatus,
) -> TaskRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = downloader.get_status(id).await.unwrap();
        if record.status == status {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} stuck in {} waiting for {status}",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
