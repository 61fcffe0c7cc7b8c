//! Queue maintenance job handler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use taskhub_database::repositories::JobRepository;
use taskhub_entity::job::model::Job;
use taskhub_resilience::ResiliencePolicy;

use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::QUEUE_MAINTENANCE_JOB_TYPE;

/// Days a terminal job row is kept for inspection before deletion.
const TERMINAL_RETENTION_DAYS: i64 = 7;

/// Handler for the periodic `queue_maintenance` job.
///
/// Releases jobs stuck `running` past the visibility timeout back to
/// `pending` — the redelivery half of at-least-once — and prunes old
/// terminal rows.
#[derive(Debug)]
pub struct QueueMaintenanceHandler {
    /// Job repository.
    job_repo: Arc<JobRepository>,
    /// Gate + deadline composition.
    policy: Arc<ResiliencePolicy>,
    /// Visibility timeout in seconds.
    visibility_timeout_seconds: u64,
}

impl QueueMaintenanceHandler {
    /// Create a new maintenance handler.
    pub fn new(
        job_repo: Arc<JobRepository>,
        policy: Arc<ResiliencePolicy>,
        visibility_timeout_seconds: u64,
    ) -> Self {
        Self {
            job_repo,
            policy,
            visibility_timeout_seconds,
        }
    }
}

#[async_trait]
impl JobHandler for QueueMaintenanceHandler {
    fn job_type(&self) -> &str {
        QUEUE_MAINTENANCE_JOB_TYPE
    }

    async fn execute(&self, _job: &Job) -> Result<(), JobExecutionError> {
        let stale_cutoff = Utc::now() - Duration::seconds(self.visibility_timeout_seconds as i64);
        let released = self
            .policy
            .write(self.job_repo.release_stale(stale_cutoff))
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Stale release failed: {e}")))?;

        if released > 0 {
            warn!(released, "Released stale running jobs for redelivery");
        }

        let retention_cutoff = Utc::now() - Duration::days(TERMINAL_RETENTION_DAYS);
        let pruned = self
            .policy
            .write(self.job_repo.cleanup_old(retention_cutoff))
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Job pruning failed: {e}")))?;

        info!(released, pruned, "Queue maintenance cycle completed");
        Ok(())
    }
}
