//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Enqueueing and the queue's own short-lived result slots
//! - [`queue_processor`] - Dispatching queued jobs to the bounded worker pool
//! - [`worker`] - Running one job and writing its status transitions
//! - [`status`] - Status lookup and file serving
//! - [`control`] - Cancellation
//! - [`lifecycle`] - Startup and shutdown coordination

mod control;
mod lifecycle;
mod queue;
mod queue_processor;
mod status;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use status::ServedMedia;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{self, Acquirer, MediaFetcher};
use crate::lifecycle::FileLifecycle;
use crate::store::{KvStore, SqliteStore};
use crate::sweeper::Sweeper;
use crate::task_store::TaskStore;
use crate::types::{Event, TaskId, TaskRecord};

/// Buffer size of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// A job waiting for a worker
#[derive(Debug, Clone)]
pub(crate) struct QueuedJob {
    pub(crate) id: TaskId,
    pub(crate) url: String,
}

/// The queue's own copy of a task record
///
/// Kept while the job is in flight and for `queue_retention` after it
/// finishes; afterwards lookups fall back to the task store.
#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
    pub(crate) record: TaskRecord,
    /// `None` while the job is pending or running
    pub(crate) expires_at: Option<tokio::time::Instant>,
}

/// Queue and worker state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// FIFO of jobs not yet picked up by a worker
    pub(crate) queue: Arc<Mutex<VecDeque<QueuedJob>>>,
    /// Worker pool bound (max_concurrent_downloads permits)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Running jobs and their cancellation tokens
    pub(crate) active_jobs: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    /// Queue-side result slots, looked up before the task store
    pub(crate) results: Arc<Mutex<HashMap<TaskId, QueueEntry>>>,
    /// Set to false during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Background services started by [`MediaDownloader::start`]
#[derive(Clone)]
pub(crate) struct Services {
    /// Cancels the queue processor and the sweeper
    pub(crate) shutdown_token: CancellationToken,
    pub(crate) handles: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Shared expiring key-value store
    pub(crate) store: Arc<dyn KvStore>,
    /// Durable task records
    pub(crate) tasks: TaskStore,
    /// Cache-or-download executor
    pub(crate) acquirer: Acquirer,
    /// Reference counts, markers and metadata
    pub(crate) lifecycle: FileLifecycle,
    /// Eviction sweeper
    pub(crate) sweeper: Sweeper,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Queue and worker state
    pub(crate) queue_state: QueueState,
    /// Background service handles
    pub(crate) services: Services,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Creates the destination directory
    /// - Opens/creates the SQLite store and runs migrations
    /// - Locates the download tool (falling back to a fetcher that reports it missing)
    ///
    /// Call [`start`](Self::start) to begin processing jobs.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        config.download.output_dir.display(),
                        e
                    ),
                ))
            })?;

        let store: Arc<dyn KvStore> =
            Arc::new(SqliteStore::new(&config.persistence.database_path).await?);
        let fetcher = executor::select_fetcher(&config);

        Self::with_components(config, store, fetcher)
    }

    /// Create a downloader over an existing store and fetcher
    ///
    /// Useful for sharing one store between several downloaders, for
    /// in-memory deployments and for tests.
    pub fn with_components(
        config: Config,
        store: Arc<dyn KvStore>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let lifecycle =
            FileLifecycle::new(store.clone(), &config.retention).with_events(event_tx.clone());
        let tasks = TaskStore::new(store.clone(), config.retention.task_retention);
        let acquirer = Acquirer::new(&config, fetcher.clone(), lifecycle.clone());
        let sweeper = Sweeper::new(&config, lifecycle.clone());

        tracing::info!(
            store = store.name(),
            fetcher = fetcher.name(),
            workers = config.download.max_concurrent_downloads,
            output_dir = %config.download.output_dir.display(),
            "media downloader initialized"
        );

        let queue_state = QueueState {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            concurrent_limit: Arc::new(Semaphore::new(config.download.max_concurrent_downloads)),
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            results: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        let services = Services {
            shutdown_token: CancellationToken::new(),
            handles: Arc::new(Mutex::new(Vec::new())),
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            tasks,
            acquirer,
            lifecycle,
            sweeper,
            event_tx,
            queue_state,
            services,
        })
    }

    /// Subscribe to task and file events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{MediaDownloader, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "media event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Shared expiring key-value store
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// File lifecycle (reference counts, markers, metadata)
    pub fn lifecycle(&self) -> &FileLifecycle {
        &self.lifecycle
    }

    /// Eviction sweeper; call [`Sweeper::sweep`] to run one pass on demand
    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
