//! Persistence seam for refresh-token records.
//!
//! The rotation state machine in [`store`](super::store) is written
//! against this trait so the Postgres repository and the in-memory test
//! double are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_database::repositories::RefreshTokenRepository;
use taskhub_entity::token::RefreshTokenRecord;

/// Storage operations the rotation state machine needs.
///
/// `supersede` is the linearization point: implementations must apply
/// the conditional retire-and-insert atomically so that of two
/// concurrent rotations on the same presented token exactly one
/// observes `true`.
#[async_trait]
pub trait TokenRecords: Send + Sync + std::fmt::Debug + 'static {
    /// Find a record by its token digest.
    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>>;

    /// Insert a freshly issued record.
    async fn insert(&self, record: &RefreshTokenRecord) -> AppResult<()>;

    /// Atomically retire the presented record (set `revoked_at` and
    /// `replaced_by_hash`) and insert its successor, but only while the
    /// presented record is still chain-terminal and unrevoked. Returns
    /// `false` when the conditional update matched nothing.
    async fn supersede(
        &self,
        presented_hash: &str,
        now: DateTime<Utc>,
        successor: &RefreshTokenRecord,
    ) -> AppResult<bool>;

    /// Idempotently revoke the record matching the digest.
    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Revoke every live token of one user. Returns the number revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<u64>;

    /// Delete records that are revoked or expire before the horizon.
    async fn delete_dead(&self, expiry_horizon: DateTime<Utc>) -> AppResult<u64>;
}

#[async_trait]
impl TokenRecords for RefreshTokenRepository {
    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>> {
        RefreshTokenRepository::find_by_hash(self, token_hash).await
    }

    async fn insert(&self, record: &RefreshTokenRecord) -> AppResult<()> {
        RefreshTokenRepository::insert(self, record).await
    }

    async fn supersede(
        &self,
        presented_hash: &str,
        now: DateTime<Utc>,
        successor: &RefreshTokenRecord,
    ) -> AppResult<bool> {
        RefreshTokenRepository::supersede(self, presented_hash, now, successor).await
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<()> {
        RefreshTokenRepository::revoke_by_hash(self, token_hash, now).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
        RefreshTokenRepository::revoke_all_for_user(self, user_id, now).await
    }

    async fn delete_dead(&self, expiry_horizon: DateTime<Utc>) -> AppResult<u64> {
        RefreshTokenRepository::delete_dead(self, expiry_horizon).await
    }
}

/// In-memory [`TokenRecords`] used by the state-machine tests. A single
/// mutex around the map gives `supersede` the same atomicity the
/// Postgres transaction provides.
#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct MemoryTokenRecords {
        rows: Mutex<HashMap<String, RefreshTokenRecord>>,
    }

    impl MemoryTokenRecords {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.rows.lock().await.len()
        }

        pub async fn get(&self, token_hash: &str) -> Option<RefreshTokenRecord> {
            self.rows.lock().await.get(token_hash).cloned()
        }
    }

    #[async_trait]
    impl TokenRecords for MemoryTokenRecords {
        async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>> {
            Ok(self.rows.lock().await.get(token_hash).cloned())
        }

        async fn insert(&self, record: &RefreshTokenRecord) -> AppResult<()> {
            self.rows
                .lock()
                .await
                .insert(record.token_hash.clone(), record.clone());
            Ok(())
        }

        async fn supersede(
            &self,
            presented_hash: &str,
            now: DateTime<Utc>,
            successor: &RefreshTokenRecord,
        ) -> AppResult<bool> {
            let mut rows = self.rows.lock().await;
            let Some(presented) = rows.get_mut(presented_hash) else {
                return Ok(false);
            };
            if presented.replaced_by_hash.is_some() || presented.revoked_at.is_some() {
                return Ok(false);
            }
            presented.revoked_at = Some(now);
            presented.replaced_by_hash = Some(successor.token_hash.clone());
            rows.insert(successor.token_hash.clone(), successor.clone());
            Ok(true)
        }

        async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<()> {
            if let Some(record) = self.rows.lock().await.get_mut(token_hash) {
                if record.revoked_at.is_none() {
                    record.revoked_at = Some(now);
                }
            }
            Ok(())
        }

        async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
            let mut revoked = 0;
            for record in self.rows.lock().await.values_mut() {
                if record.user_id == user_id && record.revoked_at.is_none() {
                    record.revoked_at = Some(now);
                    revoked += 1;
                }
            }
            Ok(revoked)
        }

        async fn delete_dead(&self, expiry_horizon: DateTime<Utc>) -> AppResult<u64> {
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|_, r| r.revoked_at.is_none() && r.expires_at >= expiry_horizon);
            Ok((before - rows.len()) as u64)
        }
    }
}
