//! TaskHub Server — todo management service.
//!
//! Main entry point that wires all crates together and starts the
//! server: database, cache, admission gate, auth, background worker,
//! and the HTTP API.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;

#[tokio::main]
async fn main() {
    let env = std::env::var("TASKHUB_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function.
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting TaskHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Database connection + migrations ─────────────────────────
    let db = taskhub_database::DatabasePool::connect(&config.database).await?;
    taskhub_database::migration::run_migrations(db.pool()).await?;
    let db_pool = db.into_pool();

    // ── Cache ────────────────────────────────────────────────────
    let cache = Arc::new(taskhub_cache::CacheManager::new(&config.cache).await?);
    tracing::info!(provider = %config.cache.provider, "Cache initialized");

    // ── Shutdown scopes ──────────────────────────────────────────
    let shutdown_token = CancellationToken::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Admission gate + resilience policy ───────────────────────
    let db_gate = Arc::new(taskhub_resilience::AdmissionGate::new(
        "db",
        config.resilience.database_permits,
    ));
    let policy = Arc::new(taskhub_resilience::ResiliencePolicy::new(
        Arc::clone(&db_gate),
        &config.resilience,
        shutdown_token.clone(),
    ));
    tracing::info!(
        gate = db_gate.name(),
        permits = config.resilience.database_permits,
        "Admission gate initialized"
    );

    // ── Repositories ─────────────────────────────────────────────
    let user_repo = Arc::new(taskhub_database::repositories::UserRepository::new(
        db_pool.clone(),
    ));
    let todo_repo = Arc::new(taskhub_database::repositories::TodoRepository::new(
        db_pool.clone(),
    ));
    let token_repo = Arc::new(taskhub_database::repositories::RefreshTokenRepository::new(
        db_pool.clone(),
    ));
    let job_repo = Arc::new(taskhub_database::repositories::JobRepository::new(
        db_pool.clone(),
    ));

    // ── Auth ─────────────────────────────────────────────────────
    let password_hasher = Arc::new(taskhub_auth::password::PasswordHasher::new());
    let password_validator = Arc::new(taskhub_auth::password::PasswordValidator::new(&config.auth));
    let jwt_encoder = Arc::new(taskhub_auth::jwt::JwtEncoder::new(&config.auth));
    let jwt_decoder = Arc::new(taskhub_auth::jwt::JwtDecoder::new(
        &config.auth,
        Arc::clone(&cache),
    ));
    let token_store = Arc::new(taskhub_auth::token::TokenStore::new(
        Arc::clone(&token_repo) as Arc<dyn taskhub_auth::token::TokenRecords>,
        &config.auth,
    ));
    let token_sweeper = Arc::new(taskhub_auth::token::TokenSweeper::new(
        Arc::clone(&token_repo) as Arc<dyn taskhub_auth::token::TokenRecords>,
    ));
    let session_manager = Arc::new(taskhub_auth::session::SessionManager::new(
        Arc::clone(&user_repo),
        Arc::clone(&token_store),
        Arc::clone(&password_hasher),
        Arc::clone(&jwt_encoder),
        Arc::clone(&jwt_decoder),
        Arc::clone(&policy),
    ));

    // ── Queue producer ───────────────────────────────────────────
    let purge_queue = Arc::new(taskhub_worker::queue::PurgeQueue::new(Arc::clone(&job_repo)));

    // ── Services ─────────────────────────────────────────────────
    let todo_service = Arc::new(taskhub_service::todo::TodoService::new(
        Arc::clone(&todo_repo),
        Arc::clone(&cache),
        Arc::clone(&policy),
    ));
    let user_service = Arc::new(taskhub_service::user::UserService::new(
        Arc::clone(&user_repo),
        Arc::clone(&password_hasher),
        Arc::clone(&password_validator),
        Arc::clone(&purge_queue),
        Arc::clone(&cache),
        Arc::clone(&policy),
        &config.worker,
    ));

    // ── Background worker + scheduler ────────────────────────────
    let (worker_handle, mut scheduler) = if config.worker.enabled {
        let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().to_string()[..8]);

        let job_queue = Arc::new(taskhub_worker::queue::JobQueue::new(
            Arc::clone(&job_repo),
            worker_id.clone(),
        ));

        let mut job_executor = taskhub_worker::executor::JobExecutor::new();

        let deleter = Arc::new(taskhub_worker::jobs::UserResourceDeleter::new(
            Arc::clone(&todo_repo),
            Arc::clone(&token_repo),
            Arc::clone(&cache),
        ));
        job_executor.register(Arc::new(
            taskhub_worker::jobs::PurgeUserResourcesHandler::new(deleter, Arc::clone(&policy)),
        ));
        job_executor.register(Arc::new(taskhub_worker::jobs::TokenSweepHandler::new(
            Arc::clone(&token_sweeper),
            Arc::clone(&policy),
        )));
        job_executor.register(Arc::new(
            taskhub_worker::jobs::QueueMaintenanceHandler::new(
                Arc::clone(&job_repo),
                Arc::clone(&policy),
                config.worker.visibility_timeout_seconds,
            ),
        ));

        let job_executor = Arc::new(job_executor);
        let runner = taskhub_worker::runner::WorkerRunner::new(
            Arc::clone(&job_queue),
            job_executor,
            config.worker.clone(),
            worker_id,
        );

        let scheduler =
            taskhub_worker::scheduler::CronScheduler::new(Arc::clone(&job_queue)).await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;

        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            runner.run(worker_cancel).await;
        });

        tracing::info!("Background worker started");
        (Some(handle), Some(scheduler))
    } else {
        tracing::info!("Background worker disabled");
        (None, None)
    };

    // The admin panel needs queue stats regardless of whether this
    // process runs a consumer.
    let stats_queue = Arc::new(taskhub_worker::queue::JobQueue::new(
        Arc::clone(&job_repo),
        "api".to_string(),
    ));
    let admin_service = Arc::new(taskhub_service::user::AdminService::new(
        Arc::clone(&user_repo),
        Arc::clone(&job_repo),
        stats_queue,
        Arc::clone(&purge_queue),
        Arc::clone(&session_manager),
        Arc::clone(&cache),
        Arc::clone(&policy),
    ));

    // ── HTTP server ──────────────────────────────────────────────
    let app_state = taskhub_api::AppState {
        config: Arc::new(config.clone()),
        db_pool: db_pool.clone(),
        cache: Arc::clone(&cache),
        policy: Arc::clone(&policy),
        jwt_decoder: Arc::clone(&jwt_decoder),
        session_manager: Arc::clone(&session_manager),
        todo_service,
        user_service,
        admin_service,
    };

    let app = taskhub_api::build_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("TaskHub server listening on {addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown");
        shutdown_token.cancel();
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Drain background tasks ───────────────────────────────────
    if let Some(s) = scheduler.as_mut() {
        let _ = s.shutdown().await;
    }
    if let Some(handle) = worker_handle {
        let grace = std::time::Duration::from_secs(config.server.shutdown_grace_seconds);
        let _ = tokio::time::timeout(grace, handle).await;
    }

    db_pool.close().await;
    tracing::info!("TaskHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
