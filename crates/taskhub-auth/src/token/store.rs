//! Refresh-token rotation state machine.
//!
//! Each issued secret starts a lineage. Using a secret (`rotate`)
//! retires its record and creates exactly one linked successor, so at
//! most one record per lineage is ever chain-terminal and valid. A
//! presented secret whose record has already been superseded is a
//! replay — the defining signal of a stolen token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use taskhub_core::config::auth::{AuthConfig, ReplayContainment};
use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_entity::token::{RefreshTokenRecord, TokenState};

use super::records::TokenRecords;
use super::secret::{generate_secret, hash_secret};

/// A freshly issued refresh secret plus its persisted record.
///
/// The `secret` field is the only copy of the plaintext that will ever
/// exist; it is returned to the caller exactly once.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Plaintext secret for the client.
    pub secret: String,
    /// When the secret expires.
    pub expires_at: DateTime<Utc>,
    /// Owning user.
    pub user_id: Uuid,
}

/// Persistent state machine for refresh tokens: issue, rotate, revoke,
/// validate, and owner resolution.
#[derive(Debug, Clone)]
pub struct TokenStore {
    /// Record persistence.
    records: Arc<dyn TokenRecords>,
    /// Token lifetime in days.
    ttl_days: u64,
    /// Accepted slack past nominal expiry (clock-skew absorption).
    grace: Duration,
    /// Reaction to replayed tokens.
    containment: ReplayContainment,
}

impl TokenStore {
    /// Create a store over the given record persistence.
    pub fn new(records: Arc<dyn TokenRecords>, config: &AuthConfig) -> Self {
        Self {
            records,
            ttl_days: config.refresh_ttl_days,
            grace: Duration::seconds(config.refresh_grace_seconds as i64),
            containment: config.replay_containment,
        }
    }

    /// Issue a fresh secret for a new session. The plaintext is
    /// returned once; only its digest is persisted.
    pub async fn issue(&self, user_id: Uuid) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let secret = generate_secret();
        let record = RefreshTokenRecord::issue(user_id, hash_secret(&secret), self.ttl_days, now);

        self.records.insert(&record).await?;

        Ok(IssuedToken {
            secret,
            expires_at: record.expires_at,
            user_id,
        })
    }

    /// Exchange a presented secret for a successor, retiring the
    /// presented one.
    ///
    /// Failure modes:
    /// - unknown digest, revoked, or expired → `TokenInvalid`
    /// - already-superseded record (replay) → `TokenReplayed`
    /// - lost supersede race → `TokenReplayed` (the winner's rotation
    ///   made the presented record non-terminal)
    pub async fn rotate(&self, presented_secret: &str) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let presented_hash = hash_secret(presented_secret);

        let record = self
            .records
            .find_by_hash(&presented_hash)
            .await?
            .ok_or_else(|| AppError::token_invalid("Refresh token not recognized"))?;

        match record.state(now) {
            TokenState::Rotated => return Err(self.on_replay(&record, now).await),
            TokenState::Revoked => {
                return Err(AppError::token_invalid("Refresh token has been revoked"));
            }
            TokenState::Expired if now >= record.expires_at + self.grace => {
                return Err(AppError::token_invalid("Refresh token has expired"));
            }
            // Active, or expired within the grace window.
            TokenState::Expired | TokenState::Active => {}
        }

        let secret = generate_secret();
        let successor =
            RefreshTokenRecord::issue(record.user_id, hash_secret(&secret), self.ttl_days, now);

        let won = self
            .records
            .supersede(&presented_hash, now, &successor)
            .await?;

        if !won {
            // A concurrent rotation transitioned the record out of its
            // terminal state between our read and the conditional
            // update. For the loser this is indistinguishable from a
            // replay, and treating it as one keeps the
            // one-successor-per-record invariant visible to callers.
            return Err(self.on_replay(&record, now).await);
        }

        info!(user_id = %record.user_id, "Refresh token rotated");

        Ok(IssuedToken {
            secret,
            expires_at: successor.expires_at,
            user_id: record.user_id,
        })
    }

    /// Idempotently revoke the record matching the presented secret.
    /// Unknown and already-revoked secrets are success no-ops: logout
    /// must not fail merely because the session was already closed.
    pub async fn revoke(&self, presented_secret: &str) -> AppResult<()> {
        self.records
            .revoke_by_hash(&hash_secret(presented_secret), Utc::now())
            .await
    }

    /// Check the presented secret against the full validity predicate,
    /// returning the precise failure.
    pub async fn validate(&self, presented_secret: &str) -> AppResult<()> {
        let now = Utc::now();
        let record = self
            .records
            .find_by_hash(&hash_secret(presented_secret))
            .await?
            .ok_or_else(|| AppError::token_invalid("Refresh token not recognized"))?;

        match record.state(now) {
            TokenState::Rotated => Err(AppError::token_replayed(
                "Refresh token was already rotated",
            )),
            TokenState::Revoked => Err(AppError::token_invalid("Refresh token has been revoked")),
            TokenState::Expired if now >= record.expires_at + self.grace => {
                Err(AppError::token_invalid("Refresh token has expired"))
            }
            TokenState::Expired | TokenState::Active => Ok(()),
        }
    }

    /// Whether the presented secret is chain-terminal, unrevoked, and
    /// within its (grace-extended) lifetime.
    pub async fn is_valid(&self, presented_secret: &str) -> AppResult<bool> {
        match self.validate(presented_secret).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind == taskhub_core::error::ErrorKind::Database => Err(e),
            Err(_) => Ok(false),
        }
    }

    /// Revoke every live token of one user (admin deactivation, account
    /// purge). Returns the number revoked.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        self.records.revoke_all_for_user(user_id, Utc::now()).await
    }

    /// Resolve the user owning the presented secret, if any.
    pub async fn owner_of(&self, presented_secret: &str) -> AppResult<Option<Uuid>> {
        Ok(self
            .records
            .find_by_hash(&hash_secret(presented_secret))
            .await?
            .map(|r| r.user_id))
    }

    /// Apply the configured containment policy to a detected replay and
    /// build the error to surface.
    async fn on_replay(&self, record: &RefreshTokenRecord, now: DateTime<Utc>) -> AppError {
        warn!(
            user_id = %record.user_id,
            record_id = %record.id,
            "Superseded refresh token presented again; possible token theft"
        );

        if self.containment == ReplayContainment::RevokeLineage {
            match self.records.revoke_all_for_user(record.user_id, now).await {
                Ok(revoked) => {
                    warn!(
                        user_id = %record.user_id,
                        revoked,
                        "Replay containment: revoked all live tokens for user"
                    );
                }
                Err(e) => {
                    warn!(
                        user_id = %record.user_id,
                        error = %e,
                        "Replay containment failed to revoke user tokens"
                    );
                }
            }
        }

        AppError::token_replayed("Refresh token was already rotated")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use taskhub_core::error::ErrorKind;

    use crate::token::records::memory::MemoryTokenRecords;

    fn store_with(
        records: Arc<MemoryTokenRecords>,
        containment: ReplayContainment,
    ) -> TokenStore {
        let config = AuthConfig {
            replay_containment: containment,
            ..AuthConfig::default()
        };
        TokenStore::new(records, &config)
    }

    fn store() -> (TokenStore, Arc<MemoryTokenRecords>) {
        let records = Arc::new(MemoryTokenRecords::new());
        (
            store_with(Arc::clone(&records), ReplayContainment::RejectOnly),
            records,
        )
    }

    #[tokio::test]
    async fn issue_then_valid() {
        let (store, _) = store();
        let user = Uuid::new_v4();
        let issued = store.issue(user).await.unwrap();

        assert!(store.is_valid(&issued.secret).await.unwrap());
        assert_eq!(store.owner_of(&issued.secret).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn plaintext_is_never_persisted() {
        let (store, records) = store();
        let issued = store.issue(Uuid::new_v4()).await.unwrap();

        assert!(records.get(&issued.secret).await.is_none());
        assert!(records.get(&hash_secret(&issued.secret)).await.is_some());
    }

    #[tokio::test]
    async fn rotate_invalidates_old_and_validates_new() {
        let (store, _) = store();
        let issued = store.issue(Uuid::new_v4()).await.unwrap();

        let rotated = store.rotate(&issued.secret).await.unwrap();

        assert!(!store.is_valid(&issued.secret).await.unwrap());
        assert!(store.is_valid(&rotated.secret).await.unwrap());
    }

    #[tokio::test]
    async fn chain_integrity_only_terminal_is_valid() {
        let (store, _) = store();
        let a = store.issue(Uuid::new_v4()).await.unwrap();
        let b = store.rotate(&a.secret).await.unwrap();
        let c = store.rotate(&b.secret).await.unwrap();

        assert!(!store.is_valid(&a.secret).await.unwrap());
        assert!(!store.is_valid(&b.secret).await.unwrap());
        assert!(store.is_valid(&c.secret).await.unwrap());
    }

    #[tokio::test]
    async fn replaying_superseded_token_reports_replay() {
        let (store, _) = store();
        let a = store.issue(Uuid::new_v4()).await.unwrap();
        let b = store.rotate(&a.secret).await.unwrap();
        let _c = store.rotate(&b.secret).await.unwrap();

        let err = store.rotate(&a.secret).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenReplayed);
    }

    #[tokio::test]
    async fn unknown_secret_is_invalid_not_replayed() {
        let (store, _) = store();
        let err = store.rotate("no-such-secret").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
    }

    #[tokio::test]
    async fn revoke_then_rotate_is_invalid() {
        let (store, _) = store();
        let issued = store.issue(Uuid::new_v4()).await.unwrap();

        store.revoke(&issued.secret).await.unwrap();

        let err = store.rotate(&issued.secret).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (store, _) = store();
        let issued = store.issue(Uuid::new_v4()).await.unwrap();

        store.revoke(&issued.secret).await.unwrap();
        store.revoke(&issued.secret).await.unwrap();
        store.revoke("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn expiry_boundary_respects_grace() {
        let records = Arc::new(MemoryTokenRecords::new());
        let store = store_with(Arc::clone(&records), ReplayContainment::RejectOnly);
        let user = Uuid::new_v4();

        // Nominal expiry one second from now: inside both the lifetime
        // and the grace window.
        let secret = generate_secret();
        let mut record = RefreshTokenRecord::issue(user, hash_secret(&secret), 7, Utc::now());
        record.expires_at = Utc::now() + Duration::seconds(1);
        records.insert(&record).await.unwrap();
        assert!(store.is_valid(&secret).await.unwrap());

        // Nominal expiry 5 seconds ago: dead by the clock but inside
        // the 10-second grace window.
        let secret = generate_secret();
        let mut record = RefreshTokenRecord::issue(user, hash_secret(&secret), 7, Utc::now());
        record.expires_at = Utc::now() - Duration::seconds(5);
        records.insert(&record).await.unwrap();
        assert!(store.is_valid(&secret).await.unwrap());

        // Nominal expiry 11 seconds ago: past the grace window.
        let secret = generate_secret();
        let mut record = RefreshTokenRecord::issue(user, hash_secret(&secret), 7, Utc::now());
        record.expires_at = Utc::now() - Duration::seconds(11);
        records.insert(&record).await.unwrap();
        assert!(!store.is_valid(&secret).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_rotations_produce_one_successor() {
        let (store, records) = store();
        let issued = store.issue(Uuid::new_v4()).await.unwrap();

        let store_a = store.clone();
        let store_b = store.clone();
        let secret_a = issued.secret.clone();
        let secret_b = issued.secret.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { store_a.rotate(&secret_a).await }),
            tokio::spawn(async move { store_b.rotate(&secret_b).await }),
        );
        let a = a.expect("task panicked");
        let b = b.expect("task panicked");

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent rotation may win");

        // Presented record + single successor: no forked lineage.
        assert_eq!(records.len().await, 2);

        let loser = if a.is_err() { a } else { b };
        assert_eq!(loser.unwrap_err().kind, ErrorKind::TokenReplayed);
    }

    #[tokio::test]
    async fn reject_only_leaves_current_lineage_alive() {
        let (store, _) = store();
        let a = store.issue(Uuid::new_v4()).await.unwrap();
        let b = store.rotate(&a.secret).await.unwrap();

        let _ = store.rotate(&a.secret).await.unwrap_err();

        assert!(
            store.is_valid(&b.secret).await.unwrap(),
            "reject-only containment must not revoke the live token"
        );
    }

    #[tokio::test]
    async fn revoke_lineage_containment_kills_live_tokens() {
        let records = Arc::new(MemoryTokenRecords::new());
        let store = store_with(Arc::clone(&records), ReplayContainment::RevokeLineage);

        let a = store.issue(Uuid::new_v4()).await.unwrap();
        let b = store.rotate(&a.secret).await.unwrap();

        let err = store.rotate(&a.secret).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenReplayed);

        assert!(
            !store.is_valid(&b.secret).await.unwrap(),
            "revoke-lineage containment must revoke the live token"
        );
    }
}
