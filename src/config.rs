//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Download behavior configuration (destination, concurrency, formats)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Destination directory shared by all workers and the sweeper (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Size of the worker pool (default: 10)
    ///
    /// Jobs beyond this bound wait in the queue instead of spawning more subprocesses.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Container format the tool is forced to produce (default: "mp4")
    #[serde(default = "default_media_extension")]
    pub media_extension: String,

    /// Extensions the sweeper treats as media files (default: mp4, webm, mkv)
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Per-job deadline (None = no deadline)
    #[serde(default, with = "optional_duration_serde")]
    pub job_timeout: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            media_extension: default_media_extension(),
            media_extensions: default_media_extensions(),
            job_timeout: None,
        }
    }
}

/// Retention windows and sweep cadence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// TTL for task records, last-access markers and cached metadata (default: 24 hours)
    #[serde(default = "default_task_retention", with = "duration_serde")]
    pub task_retention: Duration,

    /// How long the queue keeps its own copy of a finished job (default: 15 minutes)
    #[serde(default = "default_queue_retention", with = "duration_serde")]
    pub queue_retention: Duration,

    /// Interval between eviction sweeps (default: 1 hour)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Expiry guard placed on a reference count at first acquire (default: 6 hours)
    #[serde(default = "default_ref_guard_ttl", with = "duration_serde")]
    pub ref_guard_ttl: Duration,

    /// Lifetime of an in-flight download claim (default: 1 hour)
    #[serde(default = "default_claim_ttl", with = "duration_serde")]
    pub claim_ttl: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            task_retention: default_task_retention(),
            queue_retention: default_queue_retention(),
            sweep_interval: default_sweep_interval(),
            ref_guard_ttl: default_ref_guard_ttl(),
            claim_ttl: default_claim_ttl(),
        }
    }
}

/// External download tool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Binary name looked up on PATH (default: "yt-dlp")
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Explicit path to the tool (takes precedence over PATH search)
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Whether to search PATH if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Upper bound on waiting for a staged file to reach its final name (default: 5 minutes)
    #[serde(default = "default_finalize_timeout", with = "duration_serde")]
    pub finalize_timeout: Duration,

    /// Poll interval while waiting for the final name (default: 500 ms)
    #[serde(default = "default_finalize_poll", with = "millis_serde")]
    pub finalize_poll_interval: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
            tool_path: None,
            search_path: true,
            finalize_timeout: default_finalize_timeout(),
            finalize_poll_interval: default_finalize_poll(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file backing the expiring key-value store (default: "./media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Absolute prefix for generated download URLs (falls back to the request Host)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            base_url: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Sub-configs are flattened, so the serialized form has no nesting except
/// for `api`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Destination, concurrency and format settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retention windows and sweep cadence
    #[serde(flatten)]
    pub retention: RetentionConfig,

    /// External tool settings
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Store location
    #[serde(flatten)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Destination directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Reject settings that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1",
                "max_concurrent_downloads",
            ));
        }
        if self.download.media_extension.trim().is_empty() {
            return Err(config_error(
                "media_extension must not be empty",
                "media_extension",
            ));
        }
        for (value, key) in [
            (self.retention.task_retention, "task_retention"),
            (self.retention.queue_retention, "queue_retention"),
            (self.retention.sweep_interval, "sweep_interval"),
            (self.retention.ref_guard_ttl, "ref_guard_ttl"),
            (self.retention.claim_ttl, "claim_ttl"),
            (self.tools.finalize_poll_interval, "finalize_poll_interval"),
        ] {
            if value.is_zero() {
                return Err(config_error(format!("{key} must be non-zero"), key));
            }
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    10
}

fn default_media_extension() -> String {
    "mp4".to_string()
}

fn default_media_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "webm".to_string(), "mkv".to_string()]
}

fn default_task_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_queue_retention() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_ref_guard_ttl() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_claim_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_tool_name() -> String {
    "yt-dlp".to_string()
}

fn default_finalize_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_finalize_poll() -> Duration {
    Duration::from_millis(500)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./media-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
