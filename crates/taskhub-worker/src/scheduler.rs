//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info};

use taskhub_core::error::AppError;
use taskhub_entity::job::model::CreateJob;

use crate::queue::{
    JobQueue, MAINTENANCE_QUEUE, QUEUE_MAINTENANCE_JOB_TYPE, TOKEN_SWEEP_JOB_TYPE,
};

/// Token sweep cadence: every 12 hours, fixed.
const TOKEN_SWEEP_SCHEDULE: &str = "0 0 */12 * * *";
/// Queue maintenance cadence: every 5 minutes.
const QUEUE_MAINTENANCE_SCHEDULE: &str = "0 */5 * * * *";

/// Cron-based scheduler for periodic background tasks.
///
/// The scheduler only *enqueues* jobs; execution happens on the worker
/// runner like any other message, under the same admission control and
/// deadlines.
pub struct CronScheduler {
    /// The underlying job scheduler.
    scheduler: JobScheduler,
    /// Job queue for enqueuing scheduled work.
    queue: Arc<JobQueue>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler.
    pub async fn new(queue: Arc<JobQueue>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler, queue })
    }

    /// Register all default scheduled tasks.
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        self.register_enqueue_task(TOKEN_SWEEP_JOB_TYPE, TOKEN_SWEEP_SCHEDULE)
            .await?;
        self.register_enqueue_task(QUEUE_MAINTENANCE_JOB_TYPE, QUEUE_MAINTENANCE_SCHEDULE)
            .await?;

        info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        info!("Cron scheduler started");
        Ok(())
    }

    /// Shut down the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        info!("Cron scheduler shut down");
        Ok(())
    }

    /// Register a cron entry that enqueues one maintenance job per tick.
    async fn register_enqueue_task(
        &self,
        job_type: &'static str,
        schedule: &str,
    ) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                debug!(job_type, "Scheduling maintenance job");
                let params = CreateJob {
                    job_type: job_type.to_string(),
                    queue: MAINTENANCE_QUEUE.to_string(),
                    payload: serde_json::Value::Null,
                    max_attempts: 1,
                };
                if let Err(e) = queue.enqueue(params).await {
                    error!(job_type, error = %e, "Failed to enqueue scheduled job");
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create {job_type} schedule: {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {job_type} schedule: {e}")))?;

        info!(job_type, schedule, "Registered scheduled task");
        Ok(())
    }
}
