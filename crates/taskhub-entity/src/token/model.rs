//! Refresh-token record model.
//!
//! A record stores only the SHA-256 digest of the secret handed to the
//! client; the plaintext is returned exactly once at issue/rotate time
//! and never persisted. Rotation links records into a lineage through
//! `replaced_by_hash` — the record with no successor is the chain
//! terminal and the only one a client may still use.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Rotation state derived from a record's fields; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Chain-terminal, unrevoked, unexpired. The only usable state.
    Active,
    /// Superseded by a newer token in the same lineage.
    Rotated,
    /// Explicitly revoked (logout or containment).
    Revoked,
    /// Past its expiry time.
    Expired,
}

/// One persisted refresh token in a rotation lineage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshTokenRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Base64 SHA-256 digest of the issued secret. Unique.
    pub token_hash: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
    /// Set when the token is revoked or rotated away.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Digest of the token that superseded this one, if any.
    pub replaced_by_hash: Option<String>,
}

impl RefreshTokenRecord {
    /// Build a fresh record for a newly issued secret.
    pub fn issue(user_id: Uuid, token_hash: String, ttl_days: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            created_at: now,
            expires_at: now + Duration::days(ttl_days as i64),
            revoked_at: None,
            replaced_by_hash: None,
        }
    }

    /// Whether this record is the most recent token in its lineage.
    pub fn is_chain_terminal(&self) -> bool {
        self.replaced_by_hash.is_none()
    }

    /// Whether the record is active: unrevoked and unexpired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }

    /// Derive the rotation state at the given instant.
    ///
    /// A rotated record reports [`TokenState::Rotated`] even after its
    /// expiry passes — the replay signal outranks the expiry signal.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if !self.is_chain_terminal() {
            TokenState::Rotated
        } else if self.revoked_at.is_some() {
            TokenState::Revoked
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord::issue(Uuid::new_v4(), "hash".into(), 7, now)
    }

    #[test]
    fn fresh_record_is_active_terminal() {
        let now = Utc::now();
        let rec = record(now);
        assert!(rec.is_chain_terminal());
        assert_eq!(rec.state(now), TokenState::Active);
        assert_eq!(rec.expires_at, now + Duration::days(7));
    }

    #[test]
    fn rotated_outranks_expired() {
        let now = Utc::now();
        let mut rec = record(now);
        rec.replaced_by_hash = Some("next".into());
        rec.revoked_at = Some(now);
        let long_after = now + Duration::days(30);
        assert_eq!(rec.state(long_after), TokenState::Rotated);
    }

    #[test]
    fn revoked_and_expired_states() {
        let now = Utc::now();
        let mut rec = record(now);
        rec.revoked_at = Some(now);
        assert_eq!(rec.state(now), TokenState::Revoked);

        let rec = record(now);
        assert_eq!(rec.state(now + Duration::days(8)), TokenState::Expired);
    }
}
