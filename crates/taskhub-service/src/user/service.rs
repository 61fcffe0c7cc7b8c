//! User self-service — registration, profile, password, account
//! deletion.

use std::sync::Arc;

use tracing::info;

use taskhub_auth::password::{PasswordHasher, PasswordValidator};
use taskhub_cache::keys;
use taskhub_cache::provider::CacheManager;
use taskhub_core::config::worker::WorkerConfig;
use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::CacheProvider;
use taskhub_database::repositories::UserRepository;
use taskhub_entity::user::model::{CreateUser, UpdateUser};
use taskhub_entity::user::{User, UserRole};
use taskhub_resilience::ResiliencePolicy;
use taskhub_worker::queue::PurgeQueue;

use crate::context::RequestContext;

/// Data for updating a user's own profile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpdateProfileRequest {
    /// New display name (optional).
    pub display_name: Option<String>,
    /// New email (optional).
    pub email: Option<String>,
}

/// Handles user self-service operations.
#[derive(Debug, Clone)]
pub struct UserService {
    /// User repository.
    user_repo: Arc<UserRepository>,
    /// Password hasher.
    hasher: Arc<PasswordHasher>,
    /// Password validator.
    validator: Arc<PasswordValidator>,
    /// Producer side of the delete-cascade queue.
    purge_queue: Arc<PurgeQueue>,
    /// Cache manager for invalidation.
    cache: Arc<CacheManager>,
    /// Gate + deadline composition for every database call.
    policy: Arc<ResiliencePolicy>,
    /// Whether account deletion awaits the durable purge enqueue.
    confirm_purge_enqueue: bool,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(
        user_repo: Arc<UserRepository>,
        hasher: Arc<PasswordHasher>,
        validator: Arc<PasswordValidator>,
        purge_queue: Arc<PurgeQueue>,
        cache: Arc<CacheManager>,
        policy: Arc<ResiliencePolicy>,
        worker_config: &WorkerConfig,
    ) -> Self {
        Self {
            user_repo,
            hasher,
            validator,
            purge_queue,
            cache,
            policy,
            confirm_purge_enqueue: worker_config.confirm_purge_enqueue,
        }
    }

    /// Registers a new member account.
    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
        display_name: Option<String>,
    ) -> AppResult<User> {
        let username = username.trim().to_string();
        if username.len() < 3 {
            return Err(AppError::validation(
                "Username must be at least 3 characters long",
            ));
        }
        if !email.contains('@') || !email.contains('.') {
            return Err(AppError::validation("Invalid email format"));
        }

        self.validator.validate(&password)?;
        let password_hash = self.hasher.hash_password(&password)?;

        let user = self
            .policy
            .write(self.user_repo.create(&CreateUser {
                username,
                email,
                password_hash,
                display_name,
                role: UserRole::Member,
            }))
            .await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Gets the current user's full profile.
    pub async fn get_profile(&self, ctx: &RequestContext) -> AppResult<User> {
        self.policy
            .read(self.user_repo.find_by_id(ctx.user_id))
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Updates the current user's profile fields.
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        req: UpdateProfileRequest,
    ) -> AppResult<User> {
        if let Some(display_name) = &req.display_name {
            if display_name.trim().is_empty() {
                return Err(AppError::validation("Display name cannot be empty"));
            }
        }

        if let Some(email) = &req.email {
            if !email.contains('@') || !email.contains('.') {
                return Err(AppError::validation("Invalid email format"));
            }

            let existing = self
                .policy
                .read(self.user_repo.find_by_email(email))
                .await?;
            if let Some(existing) = existing {
                if existing.id != ctx.user_id {
                    return Err(AppError::conflict("Email is already in use"));
                }
            }
        }

        let updated = self
            .policy
            .write(self.user_repo.update(&UpdateUser {
                id: ctx.user_id,
                email: req.email,
                display_name: req.display_name,
            }))
            .await?;

        let _ = self.cache.delete(&keys::user_by_id(ctx.user_id)).await;

        Ok(updated)
    }

    /// Changes the current user's password after verifying the old one.
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get_profile(ctx).await?;

        if !self
            .hasher
            .verify_password(current_password, &user.password_hash)?
        {
            return Err(AppError::authentication("Current password is incorrect"));
        }

        self.validator.validate(new_password)?;
        let new_hash = self.hasher.hash_password(new_password)?;

        self.policy
            .write(self.user_repo.update_password_hash(ctx.user_id, &new_hash))
            .await?;

        info!(user_id = %ctx.user_id, "Password changed");
        Ok(())
    }

    /// Deletes the caller's own account.
    ///
    /// The account row is removed synchronously; the user's owned
    /// resources are purged asynchronously by the delete-cascade
    /// consumer. With `confirm_purge_enqueue` (the default) the purge
    /// command is durably published *before* this returns, so a crash
    /// cannot orphan the resources; without it the publish is
    /// fire-and-forget.
    pub async fn delete_account(&self, ctx: &RequestContext) -> AppResult<()> {
        let deleted = self
            .policy
            .write(self.user_repo.delete(ctx.user_id))
            .await?;
        if !deleted {
            return Err(AppError::not_found("User not found"));
        }

        if self.confirm_purge_enqueue {
            self.policy
                .write(self.purge_queue.enqueue(ctx.user_id))
                .await?;
        } else {
            let purge_queue = Arc::clone(&self.purge_queue);
            let user_id = ctx.user_id;
            tokio::spawn(async move {
                if let Err(e) = purge_queue.enqueue(user_id).await {
                    tracing::error!(user_id = %user_id, error = %e, "Failed to publish purge command");
                }
            });
        }

        let _ = self.cache.delete(&keys::user_by_id(ctx.user_id)).await;

        info!(user_id = %ctx.user_id, "Account deleted; purge command published");
        Ok(())
    }
}
