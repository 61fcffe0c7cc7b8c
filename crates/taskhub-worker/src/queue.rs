//! Job queue abstraction over the database, with at-least-once
//! delivery: a row persists until acknowledged, and acknowledgment
//! happens only after successful handling.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_database::repositories::JobRepository;
use taskhub_entity::job::model::{CreateJob, Job};
use taskhub_entity::job::status::JobStatus;

/// Queue carrying cascade-delete commands. Shared by producer and
/// consumer.
pub const PURGE_QUEUE: &str = "purge";
/// Job type of a cascade-delete command.
pub const PURGE_JOB_TYPE: &str = "purge_user_resources";
/// Queue carrying scheduled maintenance work.
pub const MAINTENANCE_QUEUE: &str = "maintenance";
/// Job type of a token sweep cycle.
pub const TOKEN_SWEEP_JOB_TYPE: &str = "token_sweep";
/// Job type of a queue maintenance cycle.
pub const QUEUE_MAINTENANCE_JOB_TYPE: &str = "queue_maintenance";

/// Job queue for enqueuing and claiming work.
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Job repository for database persistence.
    repo: Arc<JobRepository>,
    /// Worker identifier for claiming jobs.
    worker_id: String,
}

impl JobQueue {
    /// Create a new job queue handle.
    pub fn new(repo: Arc<JobRepository>, worker_id: String) -> Self {
        Self { repo, worker_id }
    }

    /// Enqueue a new job. Returns only after the row is durably stored
    /// — the INSERT round-trip is the broker confirmation.
    pub async fn enqueue(&self, params: CreateJob) -> AppResult<Job> {
        let job = self.repo.create(&params).await?;

        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            queue = %job.queue,
            "Enqueued job"
        );

        Ok(job)
    }

    /// Claim the next available job from the given queues, in order.
    pub async fn dequeue(&self, queues: &[&str]) -> AppResult<Option<Job>> {
        for queue in queues {
            if let Some(job) = self.repo.claim_next(queue, &self.worker_id).await? {
                debug!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    queue = %job.queue,
                    attempt = job.attempts,
                    "Claimed job"
                );
                return Ok(Some(job));
            }
        }

        Ok(None)
    }

    /// Acknowledge a job after successful handling.
    pub async fn complete(&self, job_id: Uuid) -> AppResult<()> {
        self.repo.complete(job_id).await?;
        debug!(job_id = %job_id, "Job acknowledged");
        Ok(())
    }

    /// Mark a job as permanently failed.
    pub async fn fail(&self, job_id: Uuid, error: &str) -> AppResult<()> {
        self.repo.fail(job_id, error).await?;
        debug!(job_id = %job_id, error, "Job failed");
        Ok(())
    }

    /// Return a claimed job to the queue for redelivery.
    pub async fn release(&self, job_id: Uuid, error: &str) -> AppResult<()> {
        self.repo.release(job_id, error).await?;
        debug!(job_id = %job_id, error, "Job released for retry");
        Ok(())
    }

    /// Get queue depth statistics.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        Ok(QueueStats {
            pending: self.repo.count_by_status(JobStatus::Pending).await?,
            running: self.repo.count_by_status(JobStatus::Running).await?,
            failed: self.repo.count_by_status(JobStatus::Failed).await?,
            worker_id: self.worker_id.clone(),
        })
    }
}

/// Queue statistics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueStats {
    /// Number of pending jobs.
    pub pending: i64,
    /// Number of running jobs.
    pub running: i64,
    /// Number of failed jobs.
    pub failed: i64,
    /// Current worker identifier.
    pub worker_id: String,
}

/// Producer side of the delete-cascade queue.
///
/// Account deletion publishes one purge command per deleted user; an
/// independent consumer drains the queue and deletes that user's owned
/// resources. The payload is the canonical string form of the user id.
#[derive(Debug, Clone)]
pub struct PurgeQueue {
    /// Job repository for durable publication.
    repo: Arc<JobRepository>,
}

impl PurgeQueue {
    /// Purge attempts before a command is parked as failed.
    const MAX_ATTEMPTS: i32 = 5;

    /// Create a new producer handle.
    pub fn new(repo: Arc<JobRepository>) -> Self {
        Self { repo }
    }

    /// Publish a "purge owned resources" command for the user.
    ///
    /// Resolves only once the row is durably stored, so a caller that
    /// awaits this before reporting account deletion complete cannot
    /// orphan the user's resources to a crash.
    pub async fn enqueue(&self, user_id: Uuid) -> AppResult<Job> {
        let job = self
            .repo
            .create(&CreateJob {
                job_type: PURGE_JOB_TYPE.to_string(),
                queue: PURGE_QUEUE.to_string(),
                payload: serde_json::Value::String(user_id.to_string()),
                max_attempts: Self::MAX_ATTEMPTS,
            })
            .await?;

        debug!(user_id = %user_id, job_id = %job.id, "Purge command published");
        Ok(job)
    }
}

/// Parse the user id out of a purge command payload.
pub fn parse_purge_payload(payload: &serde_json::Value) -> Option<Uuid> {
    payload.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_payload_roundtrip() {
        let user_id = Uuid::new_v4();
        let payload = serde_json::Value::String(user_id.to_string());
        assert_eq!(parse_purge_payload(&payload), Some(user_id));
    }

    #[test]
    fn purge_payload_rejects_garbage() {
        assert_eq!(
            parse_purge_payload(&serde_json::Value::String("not-a-uuid".into())),
            None
        );
        assert_eq!(parse_purge_payload(&serde_json::json!({"user": 1})), None);
    }
}
