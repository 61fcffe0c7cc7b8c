//! Worker runner — the long-running consumer loop.
//!
//! Polls the queues, claims jobs, and dispatches them to handlers under
//! a concurrency semaphore. A handler failure is caught, recorded on
//! the job, and the loop continues — one poisoned message can never
//! stop the worker. Acknowledgment happens strictly after successful
//! handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, trace, warn};

use taskhub_core::config::worker::WorkerConfig;

use crate::executor::{JobExecutionError, JobExecutor};
use crate::queue::{JobQueue, MAINTENANCE_QUEUE, PURGE_QUEUE};

/// Main worker runner that polls queues and executes jobs.
#[derive(Debug)]
pub struct WorkerRunner {
    /// Job queue for claiming work.
    queue: Arc<JobQueue>,
    /// Job executor for dispatching.
    executor: Arc<JobExecutor>,
    /// Worker configuration.
    config: WorkerConfig,
    /// Worker identifier.
    worker_id: String,
    /// Queues to poll (in priority order).
    queues: Vec<String>,
}

impl WorkerRunner {
    /// Create a new worker runner polling the purge and maintenance
    /// queues.
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            executor,
            config,
            worker_id,
            queues: vec![PURGE_QUEUE.to_string(), MAINTENANCE_QUEUE.to_string()],
        }
    }

    /// Run until the cancel signal fires, then drain in-flight jobs.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            poll_interval_s = self.config.poll_interval_seconds,
            queues = ?self.queues,
            "Worker started"
        );

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                claimed = self.poll_and_execute(&semaphore) => {
                    // Only sleep when the queues came back empty; while
                    // there is work, keep draining.
                    if !claimed {
                        tokio::select! {
                            _ = cancel.changed() => {
                                if *cancel.borrow() {
                                    info!(worker_id = %self.worker_id, "Worker shutting down");
                                    break;
                                }
                            }
                            _ = time::sleep(poll_interval) => {}
                        }
                    }
                }
            }
        }

        info!(worker_id = %self.worker_id, "Waiting for in-flight jobs to complete");

        let max_permits = self.config.concurrency as u32;
        let _ = tokio::time::timeout(Duration::from_secs(30), semaphore.acquire_many(max_permits))
            .await;

        info!(worker_id = %self.worker_id, "Worker shut down");
    }

    /// Claim one job and dispatch it. Returns whether a job was claimed.
    async fn poll_and_execute(&self, semaphore: &Arc<tokio::sync::Semaphore>) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                trace!("All worker slots occupied");
                // Back off until a slot frees rather than spinning.
                time::sleep(Duration::from_millis(100)).await;
                return false;
            }
        };

        let queue_refs: Vec<&str> = self.queues.iter().map(|s| s.as_str()).collect();

        match self.queue.dequeue(&queue_refs).await {
            Ok(Some(job)) => {
                let queue = Arc::clone(&self.queue);
                let executor = Arc::clone(&self.executor);

                tokio::spawn(async move {
                    let _permit = permit;
                    let job_id = job.id;

                    info!(
                        job_id = %job_id,
                        job_type = %job.job_type,
                        attempt = job.attempts,
                        max_attempts = job.max_attempts,
                        "Processing job"
                    );

                    match executor.execute(&job).await {
                        Ok(()) => {
                            // Ack only after successful handling; acking
                            // first would lose the message on a crash.
                            if let Err(e) = queue.complete(job_id).await {
                                error!(job_id = %job_id, error = %e, "Failed to acknowledge job");
                            }
                        }
                        Err(JobExecutionError::Transient(msg)) => {
                            warn!(job_id = %job_id, error = %msg, "Job failed (transient)");
                            let outcome = if job.can_retry() {
                                queue.release(job_id, &msg).await
                            } else {
                                queue.fail(job_id, &msg).await
                            };
                            if let Err(e) = outcome {
                                error!(job_id = %job_id, error = %e, "Failed to record job outcome");
                            }
                        }
                        Err(JobExecutionError::Permanent(msg)) => {
                            error!(job_id = %job_id, error = %msg, "Job failed permanently");
                            if let Err(e) = queue.fail(job_id, &msg).await {
                                error!(job_id = %job_id, error = %e, "Failed to record job failure");
                            }
                        }
                        Err(JobExecutionError::Internal(err)) => {
                            let msg = err.to_string();
                            error!(job_id = %job_id, error = %msg, "Job handler internal error");
                            let outcome = if job.can_retry() {
                                queue.release(job_id, &msg).await
                            } else {
                                queue.fail(job_id, &msg).await
                            };
                            if let Err(e) = outcome {
                                error!(job_id = %job_id, error = %e, "Failed to record job outcome");
                            }
                        }
                    }
                });

                true
            }
            Ok(None) => {
                drop(permit);
                trace!("No jobs available");
                false
            }
            Err(e) => {
                drop(permit);
                error!(error = %e, "Failed to claim job");
                false
            }
        }
    }
}
