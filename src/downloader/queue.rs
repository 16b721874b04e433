//! Enqueueing and the queue's own result slots.

use std::sync::atomic::Ordering;

use super::{MediaDownloader, QueueEntry, QueuedJob};
use crate::error::{Error, Result};
use crate::types::{Event, TaskId, TaskRecord};
use crate::utils;

impl MediaDownloader {
    /// Enqueue an acquisition of `url` and return its task id
    ///
    /// The task is recorded as `pending` in the task store before this
    /// returns, so a status lookup immediately after sees it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is not an absolute http(s) URL
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    /// - store errors if the pending record cannot be written
    pub async fn enqueue(&self, url: &str) -> Result<TaskId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        utils::validate_url(url)?;
        let url = url.trim().to_string();
        let id = TaskId::new();
        let record = TaskRecord::pending(id.clone(), url.clone());

        self.tasks.put(&record).await?;
        {
            let mut results = self.queue_state.results.lock().await;
            results.insert(
                id.clone(),
                QueueEntry {
                    record,
                    expires_at: None,
                },
            );
        }

        // Queued goes out before a worker can possibly emit Processing
        self.emit_event(Event::Queued {
            id: id.clone(),
            url: url.clone(),
        });
        self.queue_state.queue.lock().await.push_back(QueuedJob {
            id: id.clone(),
            url: url.clone(),
        });

        tracing::info!(task_id = %id, url = %url, "task enqueued");
        self.prune_results().await;
        Ok(id)
    }

    /// Number of jobs waiting for a worker
    pub async fn queue_len(&self) -> usize {
        self.queue_state.queue.lock().await.len()
    }

    /// Number of jobs currently running
    pub async fn active_count(&self) -> usize {
        self.queue_state.active_jobs.lock().await.len()
    }

    /// Queue-side copy of a task, if still within the queue's retention
    pub(crate) async fn queue_record(&self, id: &TaskId) -> Option<TaskRecord> {
        let mut results = self.queue_state.results.lock().await;
        match results.get(id) {
            Some(entry) if entry.is_expired() => {
                results.remove(id);
                None
            }
            Some(entry) => Some(entry.record.clone()),
            None => None,
        }
    }

    /// Replace the queue-side copy; terminal records start their retention clock
    pub(crate) async fn update_queue_record(&self, record: &TaskRecord) {
        let expires_at = record
            .status
            .is_terminal()
            .then(|| tokio::time::Instant::now() + self.config.retention.queue_retention);
        self.queue_state.results.lock().await.insert(
            record.id.clone(),
            QueueEntry {
                record: record.clone(),
                expires_at,
            },
        );
    }

    /// Drop queue-side copies whose retention has passed
    pub(crate) async fn prune_results(&self) {
        let mut results = self.queue_state.results.lock().await;
        let before = results.len();
        results.retain(|_, entry| !entry.is_expired());
        let pruned = before - results.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned expired queue results");
        }
    }
}

impl QueueEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at <= tokio::time::Instant::now())
    }
}
