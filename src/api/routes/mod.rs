//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Enqueue, status and cancellation of tasks
//! - [`videos`] - Streaming finished files
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{TaskId, TaskRecord, TaskStatus};

mod downloads;
mod system;
mod videos;

pub use downloads::*;
pub use system::*;
pub use videos::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Body of POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateDownloadRequest {
    /// Source URL (absolute http or https)
    pub url: String,
}

/// Response of POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateDownloadResponse {
    /// Identifier to poll with GET /downloads/{task_id}
    pub task_id: TaskId,
}

/// Response of GET /downloads/{task_id}
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadStatus {
    /// Task identifier
    pub task_id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Source URL
    pub url: String,
    /// Path of the acquired file on the server
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub file_path: Option<PathBuf>,
    /// Where to fetch the file (completed tasks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Media title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Thumbnail URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration as `minutes:seconds`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Failure reason (failed tasks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadStatus {
    /// Build the response for `record`, linking to the file under `base_url`
    pub fn from_record(record: TaskRecord, base_url: Option<&str>) -> Self {
        let download_url = match (record.status, base_url) {
            (TaskStatus::Completed, Some(base)) => Some(format!(
                "{}/videos/{}",
                base.trim_end_matches('/'),
                record.id
            )),
            _ => None,
        };

        Self {
            task_id: record.id,
            status: record.status,
            url: record.url,
            file_path: record.file_path,
            download_url,
            title: record.title,
            thumbnail_url: record.thumbnail_url,
            duration: record.duration,
            error: record.error,
        }
    }
}
