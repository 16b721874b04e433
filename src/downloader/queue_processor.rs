//! Queue processor - hands queued jobs to the bounded worker pool.

use std::time::Duration;

use super::MediaDownloader;

/// Interval between queue polling attempts when the queue is empty
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl MediaDownloader {
    /// Start the queue processor task
    ///
    /// This method spawns a background task that continuously:
    /// 1. Acquires a permit from the worker pool (respects max_concurrent_downloads)
    /// 2. Takes the oldest job from the queue
    /// 3. Registers a cancellation token for it and spawns the worker
    /// 4. Repeats until shutdown
    ///
    /// Jobs beyond the pool size wait in the queue; no more than
    /// `max_concurrent_downloads` tool processes ever run at once.
    pub fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let shutdown = self.services.shutdown_token.clone();

        tokio::spawn(async move {
            loop {
                // Acquire a permit first so a job is only dequeued when a worker is free
                let permit = tokio::select! {
                    permit = downloader.queue_state.concurrent_limit.clone().acquire_owned() => {
                        match permit {
                            Ok(p) => p,
                            // Semaphore closed during shutdown
                            Err(_) => break,
                        }
                    }
                    _ = shutdown.cancelled() => break,
                };

                // Pop and register under the queue lock so cancel() sees the job in one place
                let next = {
                    let mut queue = downloader.queue_state.queue.lock().await;
                    match queue.pop_front() {
                        Some(job) => {
                            let token = shutdown.child_token();
                            downloader
                                .queue_state
                                .active_jobs
                                .lock()
                                .await
                                .insert(job.id.clone(), token.clone());
                            Some((job, token))
                        }
                        None => None,
                    }
                };

                match next {
                    Some((job, token)) => {
                        let worker = downloader.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            worker.run_job(job, token).await;
                        });
                    }
                    None => {
                        drop(permit);
                        tokio::select! {
                            _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => {}
                            _ = shutdown.cancelled() => break,
                        }
                    }
                }
            }
            tracing::debug!("queue processor stopped");
        })
    }
}
