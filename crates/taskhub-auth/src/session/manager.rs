//! Session lifecycle manager — login, refresh, and logout flows.
//!
//! Every downstream call (user lookup, token store access) runs under
//! the database admission gate and a per-call-site deadline via
//! [`ResiliencePolicy`]. Saturation and deadline expiry surface as
//! typed `Overloaded`/`Timeout` errors, never as unhandled faults.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_database::repositories::UserRepository;
use taskhub_entity::user::User;
use taskhub_resilience::ResiliencePolicy;

use crate::jwt::{Claims, JwtDecoder, JwtEncoder};
use crate::password::PasswordHasher;
use crate::token::TokenStore;

/// Access + refresh pair handed to the client.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionTokens {
    /// Short-lived JWT access token.
    pub access_token: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Opaque refresh secret (single-use; rotated on refresh).
    pub refresh_token: String,
    /// Refresh secret expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginResult {
    /// Generated token pair.
    pub tokens: SessionTokens,
    /// The authenticated user.
    pub user: User,
}

/// Orchestrates login, refresh, and logout.
#[derive(Clone)]
pub struct SessionManager {
    /// User repository.
    user_repo: Arc<UserRepository>,
    /// Refresh-token rotation state machine.
    token_store: Arc<TokenStore>,
    /// Password hasher.
    password_hasher: Arc<PasswordHasher>,
    /// Access-token encoder.
    jwt_encoder: Arc<JwtEncoder>,
    /// Access-token decoder (for logout blocklisting).
    jwt_decoder: Arc<JwtDecoder>,
    /// Gate + deadline composition for every downstream call.
    policy: Arc<ResiliencePolicy>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish()
    }
}

impl SessionManager {
    /// Creates a new session manager with all required dependencies.
    pub fn new(
        user_repo: Arc<UserRepository>,
        token_store: Arc<TokenStore>,
        password_hasher: Arc<PasswordHasher>,
        jwt_encoder: Arc<JwtEncoder>,
        jwt_decoder: Arc<JwtDecoder>,
        policy: Arc<ResiliencePolicy>,
    ) -> Self {
        Self {
            user_repo,
            token_store,
            password_hasher,
            jwt_encoder,
            jwt_decoder,
            policy,
        }
    }

    /// Performs the login flow:
    ///
    /// 1. Resolve the user by username or email (gated short read)
    /// 2. Check account status
    /// 3. Verify the password
    /// 4. Issue a refresh secret (gated write)
    /// 5. Encode the access token
    pub async fn login(&self, username_or_email: &str, password: &str) -> AppResult<LoginResult> {
        let user = self
            .lookup_user(username_or_email)
            .await?
            .ok_or_else(|| AppError::authentication("Invalid username or password"))?;

        if !user.can_login() {
            return Err(AppError::authorization(
                "Account is deactivated. Contact an administrator.",
            ));
        }

        let password_valid = self
            .password_hasher
            .verify_password(password, &user.password_hash)?;
        if !password_valid {
            return Err(AppError::authentication("Invalid username or password"));
        }

        let issued = self
            .policy
            .write(self.token_store.issue(user.id))
            .await?;

        // Best-effort; a login must not fail because the timestamp write did.
        let _ = self
            .policy
            .write(self.user_repo.update_last_login(user.id, Utc::now()))
            .await;

        let (access_token, access_expires_at) =
            self.jwt_encoder
                .generate_access_token(user.id, user.role, &user.username)?;

        info!(user_id = %user.id, "Login successful");

        Ok(LoginResult {
            tokens: SessionTokens {
                access_token,
                access_expires_at,
                refresh_token: issued.secret,
                refresh_expires_at: issued.expires_at,
            },
            user,
        })
    }

    /// Performs the refresh flow:
    ///
    /// 1. Validate the presented secret (gated short read)
    /// 2. Resolve its owner and re-fetch the user (role may have changed)
    /// 3. Rotate the secret (gated write; atomic per presented token)
    /// 4. Encode a fresh access token
    pub async fn refresh(&self, refresh_secret: &str) -> AppResult<SessionTokens> {
        self.policy
            .read(self.token_store.validate(refresh_secret))
            .await?;

        let owner = self
            .policy
            .read(self.token_store.owner_of(refresh_secret))
            .await?
            .ok_or_else(|| AppError::token_invalid("Refresh token not recognized"))?;

        let user = self
            .policy
            .read(self.user_repo.find_by_id(owner))
            .await?
            .ok_or_else(|| AppError::token_invalid("Account no longer exists"))?;

        if !user.can_login() {
            return Err(AppError::authorization(
                "Account is deactivated. Contact an administrator.",
            ));
        }

        let rotated = self
            .policy
            .write(self.token_store.rotate(refresh_secret))
            .await?;

        let (access_token, access_expires_at) =
            self.jwt_encoder
                .generate_access_token(user.id, user.role, &user.username)?;

        info!(user_id = %user.id, "Session refreshed");

        Ok(SessionTokens {
            access_token,
            access_expires_at,
            refresh_token: rotated.secret,
            refresh_expires_at: rotated.expires_at,
        })
    }

    /// Performs the logout flow: revoke the refresh secret (idempotent)
    /// and blocklist the presented access token for its remaining TTL.
    ///
    /// Never fails merely because the session was already closed.
    pub async fn logout(&self, refresh_secret: &str, claims: Option<&Claims>) -> AppResult<()> {
        self.policy
            .write(self.token_store.revoke(refresh_secret))
            .await?;

        if let Some(claims) = claims {
            self.jwt_decoder
                .blocklist_token(claims.jti, claims.remaining_ttl_seconds())
                .await?;
            info!(user_id = %claims.user_id(), "Logout completed");
        }

        Ok(())
    }

    /// Revoke every live refresh token of a user (admin deactivation,
    /// account purge). Returns the number revoked.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> AppResult<u64> {
        self.policy
            .write(self.token_store.revoke_all_for_user(user_id))
            .await
    }

    async fn lookup_user(&self, username_or_email: &str) -> AppResult<Option<User>> {
        if username_or_email.contains('@') {
            self.policy
                .read(self.user_repo.find_by_email(username_or_email))
                .await
        } else {
            self.policy
                .read(self.user_repo.find_by_username(username_or_email))
                .await
        }
    }
}
