//! Cancellation of pending and running jobs.

use super::MediaDownloader;
use crate::error::{AcquireError, Error, Result};
use crate::types::{Event, TaskId, TaskStatus};

impl MediaDownloader {
    /// Cancel a pending or running task
    ///
    /// A running job is signalled and its worker records the failure. A job
    /// still waiting in the queue is removed and failed here, passing through
    /// `processing` so observers never see the state machine skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the task is unknown
    /// - [`Error::InvalidTransition`] if the task already finished
    pub async fn cancel(&self, id: &TaskId) -> Result<()> {
        let removed = {
            // Lock order: queue, then active jobs (same as the processor)
            let mut queue = self.queue_state.queue.lock().await;
            let active = self.queue_state.active_jobs.lock().await;

            if let Some(token) = active.get(id) {
                token.cancel();
                tracing::info!(task_id = %id, "cancellation signalled to running task");
                return Ok(());
            }

            queue
                .iter()
                .position(|job| &job.id == id)
                .and_then(|pos| queue.remove(pos))
        };

        if removed.is_some() {
            self.fail_unstarted(id).await?;
            tracing::info!(task_id = %id, "cancelled queued task");
            return Ok(());
        }

        let record = self.get_status(id).await?;
        if record.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: record.status,
                to: TaskStatus::Failed,
            });
        }
        // Dequeued but not yet registered as active cannot happen: the
        // processor does both under the queue lock.
        Err(Error::NotFound(format!("task {id} is not queued or running")))
    }

    /// Fail a task that was removed from the queue before a worker took it
    pub(crate) async fn fail_unstarted(&self, id: &TaskId) -> Result<()> {
        let mut record = self.get_status(id).await?;
        record.advance(TaskStatus::Processing)?;
        self.write_record(&record).await;
        self.emit_event(Event::Processing { id: id.clone() });

        self.finish(&mut record, Err(AcquireError::Cancelled.into()))
            .await;
        Ok(())
    }
}
