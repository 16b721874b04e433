//! # media-dl
//!
//! Asynchronous media acquisition with deduplicated caching and TTL-based
//! eviction.
//!
//! A caller enqueues a URL and gets a task id back immediately. A bounded
//! worker pool runs an external download tool (yt-dlp by default) for each
//! task, skipping the tool entirely when a file for the same URL is already
//! on disk. Clients poll the task until it is `completed` or `failed`, then
//! stream the file. Files are reclaimed once nobody has requested them for
//! the retention window and nobody is reading them.
//!
//! All shared state (task records, reference counts, last-access markers,
//! metadata) lives in an expiring key-value store ([`store::KvStore`]), so
//! several processes can share one store and one destination directory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaDownloader, TaskStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!     downloader.start().await;
//!
//!     let id = downloader.enqueue("https://example.com/watch?id=abc").await?;
//!     loop {
//!         let task = downloader.get_status(&id).await?;
//!         if task.status.is_terminal() {
//!             println!("{:?} {:?}", task.status, task.file_path);
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//!
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// URL content hashing
pub mod content_hash;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// External download tool and the cache-or-download executor
pub mod executor;
/// Key namespaces in the shared store
pub mod keys;
/// Reference-counted file lifecycle
pub mod lifecycle;
/// Expiring key-value stores
pub mod store;
/// Periodic eviction of unrequested files
pub mod sweeper;
/// Durable task records
pub mod task_store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{MediaDownloader, ServedMedia};
pub use error::{AcquireError, ApiError, Error, ErrorDetail, Result, StoreError, ToHttpStatus};
pub use executor::{CliFetcher, MediaFetcher, NoOpFetcher};
pub use lifecycle::{FileLease, FileLifecycle, ReleaseOutcome};
pub use store::{KvStore, MemoryStore, SqliteStore};
pub use sweeper::{SweepReport, Sweeper};
pub use types::{AcquiredMedia, Event, MediaMetadata, TaskId, TaskRecord, TaskStatus};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{MediaDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     downloader.start().await;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
