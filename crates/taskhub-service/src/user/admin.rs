//! Admin user panel — listing, role/status changes, account removal,
//! queue visibility.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use taskhub_auth::session::SessionManager;
use taskhub_cache::keys;
use taskhub_cache::provider::CacheManager;
use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::CacheProvider;
use taskhub_core::types::pagination::{PageRequest, PageResponse};
use taskhub_database::repositories::{JobRepository, UserRepository};
use taskhub_entity::job::model::Job;
use taskhub_entity::user::{User, UserRole, UserStatus};
use taskhub_resilience::ResiliencePolicy;
use taskhub_worker::queue::{JobQueue, PurgeQueue, QueueStats};

use crate::context::RequestContext;

/// Handles administrative operations. Every method checks the caller's
/// role before acting.
#[derive(Debug, Clone)]
pub struct AdminService {
    /// User repository.
    user_repo: Arc<UserRepository>,
    /// Job repository (queue visibility).
    job_repo: Arc<JobRepository>,
    /// Queue handle for statistics.
    job_queue: Arc<JobQueue>,
    /// Producer side of the delete-cascade queue.
    purge_queue: Arc<PurgeQueue>,
    /// Session manager for forced logout on deactivation.
    session_manager: Arc<SessionManager>,
    /// Cache manager for invalidation.
    cache: Arc<CacheManager>,
    /// Gate + deadline composition for every database call.
    policy: Arc<ResiliencePolicy>,
}

impl AdminService {
    /// Creates a new admin service.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: Arc<UserRepository>,
        job_repo: Arc<JobRepository>,
        job_queue: Arc<JobQueue>,
        purge_queue: Arc<PurgeQueue>,
        session_manager: Arc<SessionManager>,
        cache: Arc<CacheManager>,
        policy: Arc<ResiliencePolicy>,
    ) -> Self {
        Self {
            user_repo,
            job_repo,
            job_queue,
            purge_queue,
            session_manager,
            cache,
            policy,
        }
    }

    /// Lists all users.
    pub async fn list_users(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> AppResult<PageResponse<User>> {
        self.require_admin(ctx)?;
        self.policy.write(self.user_repo.find_all(page)).await
    }

    /// Fetches one user.
    pub async fn get_user(&self, ctx: &RequestContext, user_id: Uuid) -> AppResult<User> {
        self.require_admin(ctx)?;
        self.policy
            .read(self.user_repo.find_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Changes a user's role.
    pub async fn change_role(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        role: UserRole,
    ) -> AppResult<User> {
        self.require_admin(ctx)?;

        if ctx.user_id == user_id {
            return Err(AppError::conflict("Admins cannot change their own role"));
        }

        let updated = self
            .policy
            .write(self.user_repo.update_role(user_id, role))
            .await?;

        let _ = self.cache.delete(&keys::user_by_id(user_id)).await;
        info!(admin_id = %ctx.user_id, user_id = %user_id, role = %role, "Role changed");

        Ok(updated)
    }

    /// Changes a user's status. Deactivation revokes every live
    /// session of the affected user.
    pub async fn change_status(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        status: UserStatus,
    ) -> AppResult<User> {
        self.require_admin(ctx)?;

        if ctx.user_id == user_id {
            return Err(AppError::conflict("Admins cannot change their own status"));
        }

        let updated = self
            .policy
            .write(self.user_repo.update_status(user_id, status))
            .await?;

        if status == UserStatus::Inactive {
            let revoked = self.session_manager.revoke_all_sessions(user_id).await?;
            info!(user_id = %user_id, revoked, "Sessions revoked on deactivation");
        }

        let _ = self.cache.delete(&keys::user_by_id(user_id)).await;
        info!(admin_id = %ctx.user_id, user_id = %user_id, status = %status, "Status changed");

        Ok(updated)
    }

    /// Deletes a user account and publishes the cascade-delete command
    /// for their owned resources.
    pub async fn delete_user(&self, ctx: &RequestContext, user_id: Uuid) -> AppResult<()> {
        self.require_admin(ctx)?;

        if ctx.user_id == user_id {
            return Err(AppError::conflict(
                "Admins cannot delete their own account here",
            ));
        }

        let deleted = self.policy.write(self.user_repo.delete(user_id)).await?;
        if !deleted {
            return Err(AppError::not_found("User not found"));
        }

        self.policy
            .write(self.purge_queue.enqueue(user_id))
            .await?;

        let _ = self.cache.delete(&keys::user_by_id(user_id)).await;
        info!(admin_id = %ctx.user_id, user_id = %user_id, "User deleted; purge command published");

        Ok(())
    }

    /// Lists background jobs.
    pub async fn list_jobs(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Job>> {
        self.require_admin(ctx)?;
        self.policy.write(self.job_repo.find_all(page)).await
    }

    /// Returns queue depth statistics.
    pub async fn queue_stats(&self, ctx: &RequestContext) -> AppResult<QueueStats> {
        self.require_admin(ctx)?;
        self.policy.write(self.job_queue.stats()).await
    }

    fn require_admin(&self, ctx: &RequestContext) -> AppResult<()> {
        if !ctx.is_admin() {
            return Err(AppError::authorization("Administrator role required"));
        }
        Ok(())
    }
}
