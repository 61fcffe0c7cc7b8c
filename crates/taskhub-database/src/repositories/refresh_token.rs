//! Refresh-token repository implementation.
//!
//! Rotation correctness lives in [`supersede`](RefreshTokenRepository::supersede):
//! a transactional conditional update that only one of two racing
//! rotations can win.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::result::AppResult;
use taskhub_entity::token::RefreshTokenRecord;

/// Repository for refresh-token records.
#[derive(Debug, Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    /// Create a new refresh-token repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a record by its token digest.
    pub async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find refresh token", e)
        })
    }

    /// Insert a freshly issued record.
    pub async fn insert(&self, record: &RefreshTokenRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens \
             (id, user_id, token_hash, created_at, expires_at, revoked_at, replaced_by_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .bind(&record.replaced_by_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to insert refresh token", e)
        })?;
        Ok(())
    }

    /// Atomically retire the presented record and insert its successor.
    ///
    /// The UPDATE only matches while the presented record is still
    /// chain-terminal and unrevoked, so of two concurrent rotations on
    /// the same token exactly one commits; the loser observes zero rows
    /// and gets `false` back. Update and insert share one transaction —
    /// a lineage can never lose its terminal record to a crash between
    /// the two statements.
    pub async fn supersede(
        &self,
        presented_hash: &str,
        now: DateTime<Utc>,
        successor: &RefreshTokenRecord,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin rotation", e)
        })?;

        let updated = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2, replaced_by_hash = $3 \
             WHERE token_hash = $1 AND replaced_by_hash IS NULL AND revoked_at IS NULL",
        )
        .bind(presented_hash)
        .bind(now)
        .bind(&successor.token_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to retire rotated token", e)
        })?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to roll back rotation", e)
            })?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens \
             (id, user_id, token_hash, created_at, expires_at, revoked_at, replaced_by_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(successor.id)
        .bind(successor.user_id)
        .bind(&successor.token_hash)
        .bind(successor.created_at)
        .bind(successor.expires_at)
        .bind(successor.revoked_at)
        .bind(&successor.replaced_by_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to insert successor token", e)
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit rotation", e)
        })?;

        Ok(true)
    }

    /// Idempotently revoke the record matching the digest. Unknown or
    /// already-revoked digests are a no-op.
    pub async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to revoke refresh token", e)
        })?;
        Ok(())
    }

    /// Revoke every live token of one user. Returns the number revoked.
    /// Used for replay containment and account purge.
    pub async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to revoke user tokens", e)
        })?;
        Ok(result.rows_affected())
    }

    /// Delete every record of one user. Returns the number removed.
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge user tokens", e)
            })?;
        Ok(result.rows_affected())
    }

    /// Delete records that are revoked, or expire before the horizon.
    ///
    /// Only terminal-dead rows match, so this is safe to run while
    /// rotations and revocations are in flight.
    pub async fn delete_dead(
        &self,
        expiry_horizon: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE expires_at < $1 OR revoked_at IS NOT NULL",
        )
        .bind(expiry_horizon)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to sweep dead tokens", e)
        })?;
        Ok(result.rows_affected())
    }
}
