//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use sqlx::PgPool;

use taskhub_auth::jwt::decoder::JwtDecoder;
use taskhub_auth::session::SessionManager;
use taskhub_cache::provider::CacheManager;
use taskhub_core::config::AppConfig;
use taskhub_resilience::ResiliencePolicy;
use taskhub_service::todo::TodoService;
use taskhub_service::user::{AdminService, UserService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// PostgreSQL connection pool (health checks).
    pub db_pool: PgPool,
    /// Cache manager (Redis or in-memory).
    pub cache: Arc<CacheManager>,
    /// Gate + deadline policy (health snapshot).
    pub policy: Arc<ResiliencePolicy>,
    /// Access-token decoder and blocklist.
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Session lifecycle manager.
    pub session_manager: Arc<SessionManager>,
    /// Todo service.
    pub todo_service: Arc<TodoService>,
    /// User self-service.
    pub user_service: Arc<UserService>,
    /// Admin panel service.
    pub admin_service: Arc<AdminService>,
}
