//! Startup and shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use super::MediaDownloader;
use crate::error::Result;
use crate::types::Event;

/// Upper bound on how long shutdown waits for running jobs
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MediaDownloader {
    /// Start the queue processor and the eviction sweeper
    ///
    /// Calling this more than once starts duplicate services; call it once
    /// after construction.
    pub async fn start(&self) {
        let processor = self.start_queue_processor();
        let sweeper = self
            .sweeper
            .clone()
            .spawn(self.services.shutdown_token.child_token());

        let mut handles = self.services.handles.lock().await;
        handles.push(processor);
        handles.push(sweeper);
        tracing::info!(
            workers = self.config.download.max_concurrent_downloads,
            sweep_interval = ?self.config.retention.sweep_interval,
            "media downloader started"
        );
    }

    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs
    /// 2. Fails jobs still waiting in the queue and cancels running ones
    /// 3. Waits for running jobs to record their outcome (30 second bound)
    /// 4. Stops the queue processor and the sweeper
    /// 5. Emits [`Event::Shutdown`]
    ///
    /// Every task ends in a terminal state unless the wait times out.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        // 2. Drain the queue, then signal running jobs
        let drained: Vec<_> = self.queue_state.queue.lock().await.drain(..).collect();
        for job in &drained {
            if let Err(e) = self.fail_unstarted(&job.id).await {
                tracing::warn!(task_id = %job.id, error = %e, "failed to fail queued task on shutdown");
            }
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "failed queued tasks on shutdown");
        }
        self.cancel_all_active().await;

        // 3. Wait for workers to write their terminal state
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All running jobs finished"),
            Err(_) => tracing::warn!("Timeout waiting for running jobs, proceeding with shutdown"),
        }

        // 4. Stop background services
        self.services.shutdown_token.cancel();
        let handles: Vec<_> = self.services.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }

        // 5. Emit shutdown event
        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn cancel_all_active(&self) {
        let active = self.queue_state.active_jobs.lock().await;
        tracing::debug!(active_count = active.len(), "cancelling running jobs");
        for (id, token) in active.iter() {
            tracing::debug!(task_id = %id, "signalling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.queue_state.active_jobs.lock().await.len();
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "waiting for running jobs to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
