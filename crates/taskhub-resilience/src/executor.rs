//! Deadline and cancellation composition for outbound calls.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;

/// Wraps an operation with a deadline derived from whichever of
/// (timeout elapsed, external cancellation) fires first.
///
/// Deadline expiry yields `ErrorKind::Timeout`; external cancellation
/// yields `ErrorKind::Cancelled`. The two are distinct so callers can
/// tell "deadline exceeded" apart from "caller gave up". Any other
/// failure of the wrapped operation propagates unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedExecutor;

impl BoundedExecutor {
    /// Create a new executor.
    pub fn new() -> Self {
        Self
    }

    /// Run `fut` under the given deadline and external cancel signal.
    ///
    /// External cancellation is honored even before the deadline
    /// elapses. When the deadline fires, the wrapped future is dropped —
    /// any RAII guards it holds (gate permits included) are released.
    pub async fn execute<T, F>(
        &self,
        fut: F,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                Err(AppError::cancelled("Operation abandoned by caller"))
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Operation deadline exceeded");
                Err(AppError::timeout(format!(
                    "Operation exceeded its {}ms deadline",
                    timeout.as_millis()
                )))
            }
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use taskhub_core::error::ErrorKind;

    #[tokio::test]
    async fn completes_within_deadline() {
        let executor = BoundedExecutor::new();
        let cancel = CancellationToken::new();
        let result = executor
            .execute(
                async { Ok::<_, AppError>("done") },
                Duration::from_secs(1),
                &cancel,
            )
            .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn deadline_expiry_is_timeout_not_cancellation() {
        let executor = BoundedExecutor::new();
        let cancel = CancellationToken::new();
        let result: AppResult<()> = executor
            .execute(
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                },
                Duration::from_millis(30),
                &cancel,
            )
            .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn external_cancel_wins_over_pending_deadline() {
        let executor = BoundedExecutor::new();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let result: AppResult<()> = executor
            .execute(
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                },
                Duration::from_secs(5),
                &cancel,
            )
            .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn inner_failure_propagates_unchanged() {
        let executor = BoundedExecutor::new();
        let cancel = CancellationToken::new();
        let result: AppResult<()> = executor
            .execute(
                async { Err(AppError::database("connection reset")) },
                Duration::from_secs(1),
                &cancel,
            )
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.message.contains("connection reset"));
    }
}
