//! Status lookup and file serving.

use std::path::PathBuf;

use super::MediaDownloader;
use crate::error::{Error, Result};
use crate::lifecycle::FileLease;
use crate::types::{TaskId, TaskRecord, TaskStatus};
use crate::utils;

/// An open media file ready to be streamed to one client
///
/// The file holds a reference on its path for as long as `lease` lives; drop
/// the whole value (or call [`FileLease::release`]) once delivery ends.
#[derive(Debug)]
pub struct ServedMedia {
    /// Open handle positioned at the start of the file
    pub file: tokio::fs::File,
    /// Client-facing file name (`<title>.<ext>`)
    pub filename: String,
    /// MIME type derived from the extension
    pub content_type: &'static str,
    /// Size in bytes at open time
    pub size: u64,
    /// Path on disk
    pub path: PathBuf,
    /// Reader registration for `path`
    pub lease: FileLease,
}

impl MediaDownloader {
    /// Current state of a task
    ///
    /// The queue's own copy answers first while it is retained; afterwards
    /// the task store does. Never blocks on a running job.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the task is unknown or both copies have expired.
    pub async fn get_status(&self, id: &TaskId) -> Result<TaskRecord> {
        if let Some(record) = self.queue_record(id).await {
            return Ok(record);
        }
        self.tasks.get(id).await
    }

    /// Open the file produced by a completed task
    ///
    /// Registers a reader before opening, so the file cannot be removed by a
    /// concurrent release or sweep while it is being delivered. Does not
    /// refresh the last-access marker.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the task is unknown or its file is gone
    /// - [`Error::NotReady`] if the task has not completed
    pub async fn serve(&self, id: &TaskId) -> Result<ServedMedia> {
        let record = self.get_status(id).await?;
        let path = match (record.status, record.file_path) {
            (TaskStatus::Completed, Some(path)) => path,
            (status, _) => {
                return Err(Error::NotReady {
                    task_id: id.clone(),
                    status,
                });
            }
        };

        let lease = self.lifecycle.lease(&path).await?;

        let opened = async {
            let file = tokio::fs::File::open(&path).await?;
            let size = file.metadata().await?.len();
            Ok::<_, std::io::Error>((file, size))
        }
        .await;

        let (file, size) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                if let Err(release_err) = lease.release().await {
                    tracing::warn!(
                        task_id = %id,
                        error = %release_err,
                        "failed to release lease for missing file"
                    );
                }
                if e.kind() == std::io::ErrorKind::NotFound {
                    tracing::info!(task_id = %id, path = %path.display(), "served file no longer exists");
                    return Err(Error::NotFound(format!("file for task {id}")));
                }
                return Err(e.into());
            }
        };

        tracing::debug!(task_id = %id, path = %path.display(), size, "serving media file");
        Ok(ServedMedia {
            file,
            filename: utils::download_filename(&path, false),
            content_type: utils::content_type_for(&path),
            size,
            path,
            lease,
        })
    }
}
