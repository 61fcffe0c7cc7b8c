//! Gate-then-deadline composition shared by every database call site.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskhub_core::config::resilience::ResilienceConfig;
use taskhub_core::result::AppResult;

use crate::executor::BoundedExecutor;
use crate::gate::AdmissionGate;

/// Bundles the database admission gate, the bounded executor, and the
/// per-call-site deadlines into one injectable policy object.
///
/// Composition order is fixed here: admission is checked *before* the
/// deadline clock starts, so a rejected call consumes no timeout budget.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    /// Admission gate for the database resource class.
    gate: Arc<AdmissionGate>,
    /// Deadline enforcement.
    executor: BoundedExecutor,
    /// Deadline for short reads.
    read_timeout: Duration,
    /// Deadline for writes and multi-row queries.
    write_timeout: Duration,
    /// Cancellation scope for calls made under this policy; fires at
    /// process shutdown.
    cancel: CancellationToken,
}

impl ResiliencePolicy {
    /// Build the policy from configuration and the process-wide
    /// shutdown scope.
    pub fn new(gate: Arc<AdmissionGate>, config: &ResilienceConfig, cancel: CancellationToken) -> Self {
        Self {
            gate,
            executor: BoundedExecutor::new(),
            read_timeout: Duration::from_secs(config.read_timeout_seconds),
            write_timeout: Duration::from_secs(config.write_timeout_seconds),
            cancel,
        }
    }

    /// The underlying gate, for health snapshots.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Run a short read under the gate and the read deadline.
    pub async fn read<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.guarded(fut, self.read_timeout, &self.cancel).await
    }

    /// Run a write under the gate and the write deadline.
    pub async fn write<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.guarded(fut, self.write_timeout, &self.cancel).await
    }

    async fn guarded<T, F>(
        &self,
        fut: F,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        // Gate outside, executor inside: rejected calls never start the
        // timeout clock, and a deadline expiry drops the inner future
        // while the gate's permit guard is still in scope to be released.
        self.gate
            .execute(self.executor.execute(fut, timeout, cancel))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use taskhub_core::error::{AppError, ErrorKind};

    fn policy(capacity: usize) -> ResiliencePolicy {
        ResiliencePolicy::new(
            Arc::new(AdmissionGate::new("db", capacity)),
            &ResilienceConfig::default(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn read_passes_through_success() {
        let policy = policy(2);
        let result = policy.read(async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn timed_out_call_still_releases_its_permit() {
        let gate = Arc::new(AdmissionGate::new("db", 1));
        let policy = ResiliencePolicy::new(
            Arc::clone(&gate),
            &ResilienceConfig {
                database_permits: 1,
                read_timeout_seconds: 1,
                write_timeout_seconds: 1,
            },
            CancellationToken::new(),
        );

        tokio::time::pause();
        let slow = policy.write(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, AppError>(())
        });
        tokio::pin!(slow);

        let result = (&mut slow).await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
        assert_eq!(gate.available(), 1, "permit must be released after timeout");
    }

    #[tokio::test]
    async fn rejection_reports_overloaded_not_timeout() {
        let gate = Arc::new(AdmissionGate::new("db", 1));
        let policy = ResiliencePolicy::new(
            Arc::clone(&gate),
            &ResilienceConfig::default(),
            CancellationToken::new(),
        );

        let (tx, mut rx) = tokio::sync::watch::channel(false);
        let holder_policy = policy.clone();
        let holder = tokio::spawn(async move {
            holder_policy
                .read(async move {
                    let _ = rx.changed().await;
                    Ok::<_, AppError>(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = policy.read(async { Ok::<_, AppError>(()) }).await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Overloaded);

        tx.send(true).ok();
        holder.await.expect("holder panicked").unwrap();
    }
}
