//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Opaque identifier for a task, independent of any queue-internal id
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh random task id (UUID v4)
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::NotFound("empty task id".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Task status
///
/// The only legal sequence is `pending → processing → {completed | failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Enqueued, waiting for a worker
    Pending,
    /// A worker is acquiring the media
    Processing,
    /// The file is available
    Completed,
    /// Acquisition failed; see the error field
    Failed,
}

impl TaskStatus {
    /// Whether no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self → next` is an edge of the task state machine
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing metadata for a piece of media
///
/// Every field is optional: a cache hit whose metadata fetch failed still
/// returns the file with empty metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaMetadata {
    /// Source title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Best available thumbnail URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration formatted as `minutes:seconds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl MediaMetadata {
    /// True when no field is populated
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.thumbnail_url.is_none() && self.duration.is_none()
    }
}

/// Result of a successful acquisition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquiredMedia {
    /// Final path of the media file
    pub file_path: PathBuf,
    /// Metadata, possibly empty
    pub metadata: MediaMetadata,
    /// Whether the file was already on disk (no download happened)
    pub cache_hit: bool,
}

/// Durable state of one task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskRecord {
    /// Task identifier
    #[serde(rename = "task_id")]
    pub id: TaskId,
    /// Source URL
    pub url: String,
    /// Current status
    pub status: TaskStatus,
    /// Path of the acquired file (completed tasks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub file_path: Option<PathBuf>,
    /// Media title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Thumbnail URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration as `minutes:seconds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Error message (failed tasks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task was enqueued
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a fresh `pending` record
    pub fn pending(id: TaskId, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            url: url.into(),
            status: TaskStatus::Pending,
            file_path: None,
            title: None,
            thumbnail_url: None,
            duration: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, enforcing the state machine
    pub fn advance(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition to `completed` with the acquired file and its metadata
    pub fn complete(&mut self, media: &AcquiredMedia) -> Result<()> {
        self.advance(TaskStatus::Completed)?;
        self.file_path = Some(media.file_path.clone());
        self.title = media.metadata.title.clone();
        self.thumbnail_url = media.metadata.thumbnail_url.clone();
        self.duration = media.metadata.duration.clone();
        Ok(())
    }

    /// Transition to `failed` with an error message
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.advance(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

/// Event emitted during the task and file lifecycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted into the queue
    Queued {
        /// Task ID
        id: TaskId,
        /// Source URL
        url: String,
    },

    /// A worker claimed the task
    Processing {
        /// Task ID
        id: TaskId,
    },

    /// Acquisition finished successfully
    Completed {
        /// Task ID
        id: TaskId,
        /// Final file path
        path: PathBuf,
    },

    /// Acquisition failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message stored on the task
        error: String,
        /// Whether re-enqueueing the same URL could plausibly succeed
        retryable: bool,
    },

    /// A media file was removed from disk
    Evicted {
        /// Removed file
        path: PathBuf,
    },

    /// Downloader is shutting down
    Shutdown,
}
