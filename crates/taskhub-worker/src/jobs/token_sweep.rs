//! Scheduled token sweep job handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use taskhub_auth::token::TokenSweeper;
use taskhub_entity::job::model::Job;
use taskhub_resilience::ResiliencePolicy;

use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::TOKEN_SWEEP_JOB_TYPE;

/// Handler for the 12-hourly `token_sweep` job: deletes expired and
/// revoked refresh-token records.
#[derive(Debug)]
pub struct TokenSweepHandler {
    /// The sweeper core.
    sweeper: Arc<TokenSweeper>,
    /// Gate + deadline composition.
    policy: Arc<ResiliencePolicy>,
}

impl TokenSweepHandler {
    /// Create a new token sweep handler.
    pub fn new(sweeper: Arc<TokenSweeper>, policy: Arc<ResiliencePolicy>) -> Self {
        Self { sweeper, policy }
    }
}

#[async_trait]
impl JobHandler for TokenSweepHandler {
    fn job_type(&self) -> &str {
        TOKEN_SWEEP_JOB_TYPE
    }

    async fn execute(&self, _job: &Job) -> Result<(), JobExecutionError> {
        let deleted = self
            .policy
            .write(self.sweeper.sweep())
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Token sweep failed: {e}")))?;

        info!(deleted, "Token sweep cycle completed");
        Ok(())
    }
}
