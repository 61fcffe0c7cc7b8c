//! Cascade-delete consumer: purges all resources owned by a deleted
//! account.
//!
//! The handler must be idempotent — redelivery after a crash or a lost
//! acknowledgment is expected, not exceptional, so purging a user with
//! zero remaining resources reports success.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use taskhub_cache::keys;
use taskhub_cache::provider::CacheManager;
use taskhub_core::error::ErrorKind;
use taskhub_core::result::AppResult;
use taskhub_core::traits::CacheProvider;
use taskhub_database::repositories::{RefreshTokenRepository, TodoRepository};
use taskhub_entity::job::model::Job;
use taskhub_resilience::ResiliencePolicy;

use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::{PURGE_JOB_TYPE, parse_purge_payload};

/// Deletion of everything a user owns. Split out as a trait so the
/// handler's queue semantics can be tested without a database.
#[async_trait]
pub trait OwnedResourceDeleter: Send + Sync + std::fmt::Debug {
    /// Delete all resources owned by the user. Returns the number of
    /// resources removed; zero is a success.
    async fn delete_owned(&self, user_id: Uuid) -> AppResult<u64>;
}

/// Production deleter: removes the user's todos and refresh tokens and
/// invalidates their cache entries.
#[derive(Debug, Clone)]
pub struct UserResourceDeleter {
    /// Todo repository.
    todo_repo: Arc<TodoRepository>,
    /// Refresh-token repository.
    token_repo: Arc<RefreshTokenRepository>,
    /// Cache manager for invalidation.
    cache: Arc<CacheManager>,
}

impl UserResourceDeleter {
    /// Create a new deleter.
    pub fn new(
        todo_repo: Arc<TodoRepository>,
        token_repo: Arc<RefreshTokenRepository>,
        cache: Arc<CacheManager>,
    ) -> Self {
        Self {
            todo_repo,
            token_repo,
            cache,
        }
    }
}

#[async_trait]
impl OwnedResourceDeleter for UserResourceDeleter {
    async fn delete_owned(&self, user_id: Uuid) -> AppResult<u64> {
        let todos = self.todo_repo.delete_all_for_user(user_id).await?;
        let tokens = self.token_repo.delete_all_for_user(user_id).await?;

        // Cache entries expire on their own; invalidation here just
        // shortens the window. Failure is not worth a redelivery.
        let _ = self
            .cache
            .delete_pattern(&keys::todo_list_pattern(user_id))
            .await;
        let _ = self.cache.delete_pattern(&keys::user_pattern(user_id)).await;

        info!(user_id = %user_id, todos, tokens, "Purged owned resources");
        Ok(todos + tokens)
    }
}

/// Handler for `purge_user_resources` jobs.
///
/// Runs the deleter under the database admission gate and a bounded
/// deadline, on the worker's own cancellation scope.
#[derive(Debug)]
pub struct PurgeUserResourcesHandler {
    /// The resource-deletion collaborator.
    deleter: Arc<dyn OwnedResourceDeleter>,
    /// Gate + deadline composition.
    policy: Arc<ResiliencePolicy>,
}

impl PurgeUserResourcesHandler {
    /// Create a new purge handler.
    pub fn new(deleter: Arc<dyn OwnedResourceDeleter>, policy: Arc<ResiliencePolicy>) -> Self {
        Self { deleter, policy }
    }
}

#[async_trait]
impl JobHandler for PurgeUserResourcesHandler {
    fn job_type(&self) -> &str {
        PURGE_JOB_TYPE
    }

    async fn execute(&self, job: &Job) -> Result<(), JobExecutionError> {
        let Some(user_id) = parse_purge_payload(&job.payload) else {
            // A malformed payload can never succeed; retrying it would
            // just occupy the queue.
            return Err(JobExecutionError::Permanent(format!(
                "Purge payload is not a user id: {}",
                job.payload
            )));
        };

        let result = self
            .policy
            .write(self.deleter.delete_owned(user_id))
            .await;

        match result {
            Ok(removed) => {
                info!(user_id = %user_id, removed, "Purge command handled");
                Ok(())
            }
            Err(e) if matches!(e.kind, ErrorKind::Overloaded | ErrorKind::Timeout) => {
                Err(JobExecutionError::Transient(e.to_string()))
            }
            Err(e) => Err(JobExecutionError::Transient(format!(
                "Purge failed for user {user_id}: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::Utc;
    use tokio_util::sync::CancellationToken;

    use taskhub_core::config::resilience::ResilienceConfig;
    use taskhub_entity::job::status::JobStatus;
    use taskhub_resilience::AdmissionGate;

    /// Deleter over a counter: first call "removes" the seeded amount,
    /// later calls find nothing. Mirrors redelivery against an
    /// already-purged user.
    #[derive(Debug)]
    struct CountingDeleter {
        remaining: AtomicU64,
        calls: AtomicU64,
    }

    impl CountingDeleter {
        fn with_resources(n: u64) -> Self {
            Self {
                remaining: AtomicU64::new(n),
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl OwnedResourceDeleter for CountingDeleter {
        async fn delete_owned(&self, _user_id: Uuid) -> AppResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remaining.swap(0, Ordering::SeqCst))
        }
    }

    fn policy() -> Arc<ResiliencePolicy> {
        Arc::new(ResiliencePolicy::new(
            Arc::new(AdmissionGate::new("db", 4)),
            &ResilienceConfig::default(),
            CancellationToken::new(),
        ))
    }

    fn purge_job(payload: serde_json::Value) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            job_type: PURGE_JOB_TYPE.to_string(),
            queue: "purge".to_string(),
            payload,
            error_message: None,
            status: JobStatus::Running,
            attempts: 1,
            max_attempts: 5,
            started_at: Some(now),
            completed_at: None,
            worker_id: Some("worker-test".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn handler_is_idempotent_on_empty_state() {
        let deleter = Arc::new(CountingDeleter::with_resources(3));
        let handler = PurgeUserResourcesHandler::new(Arc::clone(&deleter) as _, policy());
        let job = purge_job(serde_json::Value::String(Uuid::new_v4().to_string()));

        // First delivery removes everything; the redelivery finds
        // nothing left and must still succeed.
        assert!(handler.execute(&job).await.is_ok());
        assert!(handler.execute(&job).await.is_ok());
        assert_eq!(deleter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_payload_is_permanent() {
        let deleter = Arc::new(CountingDeleter::with_resources(0));
        let handler = PurgeUserResourcesHandler::new(Arc::clone(&deleter) as _, policy());
        let job = purge_job(serde_json::json!({"oops": true}));

        let err = handler.execute(&job).await.unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(_)));
        assert_eq!(
            deleter.calls.load(Ordering::SeqCst),
            0,
            "deleter must not run on a malformed command"
        );
    }

    #[tokio::test]
    async fn saturated_gate_is_transient() {
        let gate = Arc::new(AdmissionGate::new("db", 1));
        let policy = Arc::new(ResiliencePolicy::new(
            Arc::clone(&gate),
            &ResilienceConfig::default(),
            CancellationToken::new(),
        ));

        // Occupy the only permit for the duration of the attempt.
        let blocker = Arc::clone(&gate);
        let (tx, mut rx) = tokio::sync::watch::channel(false);
        let hold = tokio::spawn(async move {
            blocker
                .execute(async move {
                    let _ = rx.changed().await;
                    Ok::<_, taskhub_core::AppError>(())
                })
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let deleter = Arc::new(CountingDeleter::with_resources(1));
        let handler = PurgeUserResourcesHandler::new(Arc::clone(&deleter) as _, policy);
        let job = purge_job(serde_json::Value::String(Uuid::new_v4().to_string()));

        let err = handler.execute(&job).await.unwrap_err();
        assert!(
            matches!(err, JobExecutionError::Transient(_)),
            "overload must be retryable, not fatal"
        );

        tx.send(true).ok();
        hold.await.expect("holder panicked").unwrap();
    }
}
