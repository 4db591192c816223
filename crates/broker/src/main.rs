//! NoETL Control Plane Server
//!
//! An async Rust server that provides the control plane API for NoETL,
//! handling workflow orchestration, catalog management, and event processing.

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noetl_broker::{
    config::{AppConfig, DatabaseConfig},
    db::{create_pool, DbPool},
    handlers,
    services::{CatalogService, CredentialService, ExecutionService, KeychainService, QueueService},
    state::AppState,
};

/// Default encryption key for development (should be overridden in production).
const DEFAULT_ENCRYPTION_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Initialize tracing/logging.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,noetl_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router with all routes.
#[allow(clippy::too_many_arguments)]
fn build_router(
    state: AppState,
    db_pool: DbPool,
    catalog_service: CatalogService,
    credential_service: CredentialService,
    keychain_service: KeychainService,
    execution_service: ExecutionService,
    queue_service: QueueService,
) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Health/readiness routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready))
        .with_state(state.clone());

    // Catalog routes - playbooks and credential/keychain bundles are all
    // versioned entries in the same content-addressed store.
    let catalog_routes = Router::new()
        .route("/catalog/register", post(handlers::catalog::register))
        .route("/catalog/list", post(handlers::catalog::list))
        .route("/catalog/resource", post(handlers::catalog::get_resource))
        .with_state(catalog_service);

    let credential_routes = Router::new()
        .route(
            "/credentials",
            post(handlers::credentials::create_or_update),
        )
        .route("/credentials", get(handlers::credentials::list))
        .route("/credentials/:identifier", get(handlers::credentials::get))
        .route(
            "/credentials/:identifier",
            delete(handlers::credentials::delete),
        )
        .with_state(credential_service);

    let keychain_routes = Router::new()
        .route(
            "/keychain/:catalog_id/:keychain_name",
            get(handlers::keychain::get),
        )
        .route(
            "/keychain/:catalog_id/:keychain_name",
            post(handlers::keychain::set),
        )
        .route(
            "/keychain/:catalog_id/:keychain_name",
            delete(handlers::keychain::delete),
        )
        .route(
            "/keychain/catalog/:catalog_id",
            get(handlers::keychain::list_by_catalog),
        )
        .with_state(keychain_service);

    // Execution start - records execution_started and runs the
    // orchestrator to dispatch the start step through the queue.
    let execute_routes = Router::new()
        .route("/execute", post(handlers::execute))
        .with_state(state);

    // Execution introspection and cancellation.
    let executions_routes = Router::new()
        .route("/execution/:execution_id", get(handlers::executions::get))
        .route(
            "/execution/:execution_id/cancel",
            post(handlers::executions::cancel),
        )
        .route("/executions", get(handlers::executions::list))
        .route(
            "/execution/:execution_id/status",
            get(handlers::executions::get_status),
        )
        .route(
            "/execution/:execution_id/finalize",
            post(handlers::executions::finalize),
        )
        .with_state(execution_service);

    // Ordered event-log slice for an execution, `since` a timestamp.
    let events_routes = Router::new()
        .route(
            "/execution/:execution_id/events",
            get(handlers::executions::events_since),
        )
        .with_state(db_pool.clone());

    // Worker dispatch protocol - lease, heartbeat, complete, fail.
    let queue_routes = Router::new()
        .route("/queue/lease", post(handlers::queue::lease))
        .route("/queue/heartbeat", post(handlers::queue::heartbeat))
        .route("/queue/complete", post(handlers::queue::complete))
        .route("/queue/fail", post(handlers::queue::fail))
        .with_state(queue_service);

    // Worker helper: render a template fragment against a context.
    let render_routes = Router::new().route("/context/render", post(handlers::render::render));

    // Read-only SQL passthrough for observability.
    let query_routes = Router::new()
        .route("/query", post(handlers::query::query))
        .with_state(db_pool);

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .merge(catalog_routes)
        .merge(credential_routes)
        .merge(keychain_routes)
        .merge(execute_routes)
        .merge(executions_routes)
        .merge(events_routes)
        .merge(queue_routes)
        .merge(render_routes)
        .merge(query_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Get encryption key from environment or use default.
fn get_encryption_key() -> String {
    std::env::var("NOETL_ENCRYPTION_KEY").unwrap_or_else(|_| {
        tracing::warn!("NOETL_ENCRYPTION_KEY not set, using default (not secure for production)");
        DEFAULT_ENCRYPTION_KEY.to_string()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting NoETL Control Plane"
    );

    // Load configuration
    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load database config, using defaults");
        DatabaseConfig::default()
    });

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        debug = app_config.debug,
        "Configuration loaded"
    );

    // Create database connection pool
    let db_pool = create_pool(&db_config).await?;

    // Get encryption key
    let encryption_key = get_encryption_key();

    // Create services
    let catalog_service = CatalogService::new(db_pool.clone());
    let credential_service = CredentialService::new(db_pool.clone(), &encryption_key)?;
    let keychain_service = KeychainService::new(db_pool.clone(), &encryption_key)?;
    let execution_service = ExecutionService::new(db_pool.clone());
    let queue_service = QueueService::new(db_pool.clone());
    queue_service.start_sweeper();

    // Create application state
    let state = AppState::new(db_pool.clone(), app_config.clone());

    // Build the router
    let app = build_router(
        state,
        db_pool,
        catalog_service,
        credential_service,
        keychain_service,
        execution_service,
        queue_service,
    );

    // Bind to address
    let addr: SocketAddr = app_config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
