//! Periodic purge of dead refresh-token records.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use taskhub_core::result::AppResult;

use super::records::TokenRecords;

/// Hours between sweep cycles. Fixed cadence, not per-call configurable.
pub const SWEEP_INTERVAL_HOURS: u64 = 12;

/// Deletes refresh-token records that can never validate again:
/// revoked ones, and ones expiring within the next day.
///
/// Safe to run concurrently with `rotate`/`revoke` — only rows already
/// in a terminal dead condition match the delete predicate, so the
/// storage layer's normal consistency is enough.
#[derive(Debug, Clone)]
pub struct TokenSweeper {
    /// Record persistence.
    records: Arc<dyn TokenRecords>,
}

impl TokenSweeper {
    /// Create a sweeper over the given record persistence.
    pub fn new(records: Arc<dyn TokenRecords>) -> Self {
        Self { records }
    }

    /// Run one sweep cycle. Returns the number of records deleted.
    pub async fn sweep(&self) -> AppResult<u64> {
        let horizon = Utc::now() + Duration::days(1);
        let deleted = self.records.delete_dead(horizon).await?;

        if deleted > 0 {
            info!(deleted, "Swept dead refresh tokens");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use uuid::Uuid;

    use taskhub_entity::token::RefreshTokenRecord;

    use crate::token::records::memory::MemoryTokenRecords;
    use crate::token::secret::{generate_secret, hash_secret};

    #[tokio::test]
    async fn sweeps_revoked_and_expiring_but_not_active() {
        let records = Arc::new(MemoryTokenRecords::new());
        let sweeper = TokenSweeper::new(records.clone() as Arc<dyn TokenRecords>);
        let user = Uuid::new_v4();
        let now = Utc::now();

        // Active, 7 days out: survives.
        let active = RefreshTokenRecord::issue(user, hash_secret(&generate_secret()), 7, now);
        let active_hash = active.token_hash.clone();
        records.insert(&active).await.unwrap();

        // Revoked: swept.
        let mut revoked = RefreshTokenRecord::issue(user, hash_secret(&generate_secret()), 7, now);
        revoked.revoked_at = Some(now);
        records.insert(&revoked).await.unwrap();

        // Expiring within a day: swept.
        let mut expiring = RefreshTokenRecord::issue(user, hash_secret(&generate_secret()), 7, now);
        expiring.expires_at = now + chrono::Duration::hours(6);
        records.insert(&expiring).await.unwrap();

        let deleted = sweeper.sweep().await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(records.len().await, 1);
        assert!(records.get(&active_hash).await.is_some());
    }

    #[tokio::test]
    async fn sweep_on_empty_store_is_zero() {
        let records = Arc::new(MemoryTokenRecords::new());
        let sweeper = TokenSweeper::new(records as Arc<dyn TokenRecords>);
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
    }
}
