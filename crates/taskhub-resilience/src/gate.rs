//! Fixed-capacity admission gate for downstream resource classes.
//!
//! The gate rejects excess work immediately instead of queueing it:
//! queueing would convert overload into unbounded latency, while
//! fail-fast rejection isolates a saturated dependency from exhausting
//! the caller's concurrency budget.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::warn;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;

/// Point-in-time view of a gate, for health reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSnapshot {
    /// Diagnostic label of the gate.
    pub name: String,
    /// Configured permit capacity.
    pub capacity: usize,
    /// Permits currently free.
    pub available: usize,
    /// Permits currently held by in-flight calls.
    pub in_flight: usize,
}

/// Fixed-capacity, non-blocking permit pool protecting one downstream
/// resource class (e.g. `"db"`).
///
/// Acquisition is a zero-wait test-and-set: either a permit is free and
/// the guarded operation runs, or the call fails with
/// `ErrorKind::Overloaded` without the operation ever starting. The
/// permit is released on every exit path — success, error, and
/// cancellation — because it is held as an RAII guard dropped with the
/// future.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    /// Diagnostic label used in logs and errors.
    name: Arc<str>,
    /// Configured capacity.
    capacity: usize,
    /// Permit pool.
    permits: Arc<Semaphore>,
}

impl AdmissionGate {
    /// Create a gate with the given diagnostic name and permit capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero — a zero-capacity gate would reject
    /// every call and is always a configuration mistake.
    pub fn new(name: &str, capacity: usize) -> Self {
        assert!(capacity > 0, "admission gate capacity must be positive");
        Self {
            name: Arc::from(name),
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// The gate's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `fut` under one permit.
    ///
    /// Returns `ErrorKind::Overloaded` without polling `fut` when no
    /// permit is free. No queueing, no fairness guarantee beyond "first
    /// caller to find a free permit wins".
    pub async fn execute<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let _permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                warn!(gate = %self.name, capacity = self.capacity, "Admission rejected: gate saturated");
                return Err(AppError::overloaded(format!(
                    "Admission gate '{}' is saturated ({} permits in use)",
                    self.name, self.capacity
                )));
            }
            Err(TryAcquireError::Closed) => {
                return Err(AppError::internal(format!(
                    "Admission gate '{}' permit pool is closed",
                    self.name
                )));
            }
        };

        // The permit guard is dropped when this future completes or is
        // cancelled mid-flight, so capacity can never leak.
        fut.await
    }

    /// Capture a snapshot for health endpoints.
    pub fn snapshot(&self) -> GateSnapshot {
        let available = self.permits.available_permits();
        GateSnapshot {
            name: self.name.to_string(),
            capacity: self.capacity,
            available,
            in_flight: self.capacity.saturating_sub(available),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use taskhub_core::error::ErrorKind;

    #[tokio::test]
    async fn runs_action_under_capacity() {
        let gate = AdmissionGate::new("db", 2);
        let result = gate.execute(async { Ok::<_, AppError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn capacity_plus_one_rejects_exactly_one() {
        let gate = Arc::new(AdmissionGate::new("db", 3));
        let (release_tx, _) = tokio::sync::watch::channel(false);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            let mut release = release_tx.subscribe();
            handles.push(tokio::spawn(async move {
                gate.execute(async move {
                    let _ = release.changed().await;
                    Ok::<_, AppError>(())
                })
                .await
            }));
        }

        // Let all four tasks reach the gate before releasing the holders.
        tokio::time::sleep(Duration::from_millis(50)).await;
        release_tx.send(true).ok();

        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.expect("task panicked") {
                Ok(()) => ok += 1,
                Err(e) => {
                    assert_eq!(e.kind, ErrorKind::Overloaded);
                    rejected += 1;
                }
            }
        }
        assert_eq!(ok, 3);
        assert_eq!(rejected, 1);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn rejected_calls_never_run() {
        let gate = Arc::new(AdmissionGate::new("db", 1));
        let ran = Arc::new(AtomicU32::new(0));

        let holder_gate = Arc::clone(&gate);
        let holder = tokio::spawn(async move {
            holder_gate
                .execute(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, AppError>(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ran_clone = Arc::clone(&ran);
        let result = gate
            .execute(async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Overloaded);
        assert_eq!(ran.load(Ordering::SeqCst), 0, "rejected action must not run");
        holder.await.expect("holder panicked").unwrap();
    }

    #[tokio::test]
    async fn permit_released_on_error() {
        let gate = AdmissionGate::new("db", 1);
        let result: AppResult<()> = gate
            .execute(async { Err(AppError::database("boom")) })
            .await;
        assert!(result.is_err());
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn permit_released_when_guarded_future_is_dropped() {
        let gate = Arc::new(AdmissionGate::new("db", 1));

        let inner_gate = Arc::clone(&gate);
        let task = tokio::spawn(async move {
            inner_gate
                .execute(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, AppError>(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.available(), 0);

        task.abort();
        let _ = task.await;

        assert_eq!(gate.available(), 1, "cancelled holder must release its permit");
    }

    /// Three 100ms actions against capacity 2: two run concurrently and
    /// one is rejected immediately, so total wall time stays near 100ms.
    #[tokio::test]
    async fn overload_does_not_serialize_work() {
        let gate = Arc::new(AdmissionGate::new("db", 2));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.execute(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, AppError>(())
                })
                .await
            }));
        }

        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.expect("task panicked") {
                Ok(()) => ok += 1,
                Err(_) => rejected += 1,
            }
        }

        assert_eq!(ok, 2);
        assert_eq!(rejected, 1);
        assert!(
            start.elapsed() < Duration::from_millis(190),
            "rejected call must not queue behind the holders"
        );
    }

    #[tokio::test]
    async fn snapshot_reports_in_flight() {
        let gate = Arc::new(AdmissionGate::new("search", 4));
        let (release_tx, mut release_rx) = tokio::sync::watch::channel(false);

        let inner = Arc::clone(&gate);
        let task = tokio::spawn(async move {
            inner
                .execute(async move {
                    let _ = release_rx.changed().await;
                    Ok::<_, AppError>(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snap = gate.snapshot();
        assert_eq!(snap.name, "search");
        assert_eq!(snap.capacity, 4);
        assert_eq!(snap.in_flight, 1);
        assert_eq!(snap.available, 3);

        release_tx.send(true).ok();
        task.await.expect("task panicked").unwrap();
    }
}
