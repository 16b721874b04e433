//! Execution of one job: status transitions around the acquisition.

use tokio_util::sync::CancellationToken;

use super::{MediaDownloader, QueuedJob};
use crate::error::{AcquireError, Error, Result};
use crate::types::{AcquiredMedia, Event, TaskRecord, TaskStatus};

impl MediaDownloader {
    /// Run one job to a terminal state
    ///
    /// The worker is the only writer of a task after enqueue: it moves the task
    /// to `processing`, runs the acquisition (racing cancellation and the
    /// optional job deadline), then writes exactly one of `completed` or
    /// `failed`. Every transition goes to both the queue's result slot and the
    /// task store. Failures are recorded, never retried.
    pub(crate) async fn run_job(&self, job: QueuedJob, cancel: CancellationToken) {
        let id = job.id.clone();

        let mut record = match self.current_record(&job).await {
            Some(record) => record,
            None => {
                tracing::error!(task_id = %id, "no record for queued task, dropping job");
                self.queue_state.active_jobs.lock().await.remove(&id);
                return;
            }
        };

        if let Err(e) = record.advance(TaskStatus::Processing) {
            tracing::error!(task_id = %id, error = %e, "task cannot start processing");
            self.queue_state.active_jobs.lock().await.remove(&id);
            return;
        }
        self.write_record(&record).await;
        self.emit_event(Event::Processing { id: id.clone() });
        tracing::info!(task_id = %id, url = %job.url, "processing task");

        let outcome: Result<AcquiredMedia> = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireError::Cancelled.into()),
            result = self.acquire_with_deadline(&job.url) => result,
        };

        self.finish(&mut record, outcome).await;
        self.queue_state.active_jobs.lock().await.remove(&id);
    }

    async fn acquire_with_deadline(&self, url: &str) -> Result<AcquiredMedia> {
        match self.config.download.job_timeout {
            Some(limit) => tokio::time::timeout(limit, self.acquirer.acquire(url))
                .await
                .unwrap_or_else(|_| Err(AcquireError::TimedOut { after: limit }.into())),
            None => self.acquirer.acquire(url).await,
        }
    }

    /// Write the terminal state for a processing task
    pub(crate) async fn finish(&self, record: &mut TaskRecord, outcome: Result<AcquiredMedia>) {
        let id = record.id.clone();
        let event = match outcome {
            Ok(media) => match record.complete(&media) {
                Ok(()) => {
                    tracing::info!(
                        task_id = %id,
                        path = %media.file_path.display(),
                        cache_hit = media.cache_hit,
                        "task completed"
                    );
                    Event::Completed {
                        id: id.clone(),
                        path: media.file_path,
                    }
                }
                Err(e) => {
                    tracing::error!(task_id = %id, error = %e, "cannot complete task");
                    return;
                }
            },
            Err(err) => {
                let message = err.to_string();
                if let Err(e) = record.fail(message.clone()) {
                    tracing::error!(task_id = %id, error = %e, "cannot fail task");
                    return;
                }
                let retryable = matches!(&err, Error::Acquire(e) if e.is_retryable());
                tracing::warn!(task_id = %id, error = %message, retryable, "task failed");
                Event::Failed {
                    id: id.clone(),
                    error: message,
                    retryable,
                }
            }
        };

        self.write_record(record).await;
        self.emit_event(event);
    }

    /// Record written for this job at enqueue time
    async fn current_record(&self, job: &QueuedJob) -> Option<TaskRecord> {
        if let Some(record) = self.queue_record(&job.id).await {
            return Some(record);
        }
        match self.tasks.find(&job.id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(task_id = %job.id, error = %e, "failed to read task record");
                None
            }
        }
    }

    /// Write a transition to the queue slot and the task store
    ///
    /// A store failure is logged; the queue slot still answers status lookups
    /// for the rest of the queue retention window.
    pub(crate) async fn write_record(&self, record: &TaskRecord) {
        self.update_queue_record(record).await;
        if let Err(e) = self.tasks.put(record).await {
            tracing::error!(
                task_id = %record.id,
                status = %record.status,
                error = %e,
                "failed to persist task state"
            );
        }
    }
}
