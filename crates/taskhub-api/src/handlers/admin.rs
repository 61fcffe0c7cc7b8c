//! Admin panel handlers — user management and queue visibility.

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use taskhub_core::error::AppError;
use taskhub_core::types::pagination::PageResponse;
use taskhub_entity::job::model::Job;
use taskhub_entity::user::{User, UserRole, UserStatus};
use taskhub_worker::queue::QueueStats;

use crate::dto::request::{ChangeRoleRequest, ChangeStatusRequest};
use crate::dto::response::{ApiResponse, MessageResponse, UserResponse};
use crate::extractors::{AuthUser, PaginationParams};
use crate::state::AppState;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<User>>>, AppError> {
    let page = pagination.into_page_request();
    let users = state.admin_service.list_users(&auth.ctx, &page).await?;
    Ok(Json(ApiResponse::ok(users)))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = state.admin_service.get_user(&auth.ctx, id).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /api/admin/users/{id}/role
pub async fn change_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let role: UserRole = req.role.parse()?;
    let user = state.admin_service.change_role(&auth.ctx, id, role).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /api/admin/users/{id}/status
pub async fn change_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let status: UserStatus = req.status.parse()?;
    let user = state
        .admin_service
        .change_status(&auth.ctx, id, status)
        .await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.admin_service.delete_user(&auth.ctx, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new(
        "User deleted. Owned resources will be purged shortly.",
    ))))
}

/// GET /api/admin/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Job>>>, AppError> {
    let page = pagination.into_page_request();
    let jobs = state.admin_service.list_jobs(&auth.ctx, &page).await?;
    Ok(Json(ApiResponse::ok(jobs)))
}

/// GET /api/admin/jobs/stats
pub async fn queue_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<QueueStats>>, AppError> {
    let stats = state.admin_service.queue_stats(&auth.ctx).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
