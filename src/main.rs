//! Telemetry Collector Server
//!
//! Receives behavioral telemetry from the browser collector, scores each
//! sample with the bot classifier and stores the enriched record.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TELEMETRY COLLECTOR                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  POST /collect                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  Feature  │─▶│ Inference │─▶│  Record Sink            │ │
//! │  │  Adapter  │  │  Guard    │  │  (append-only)          │ │
//! │  └───────────┘  └─────┬─────┘  └────────────┬────────────┘ │
//! │                       │                     ▼              │
//! │                ┌──────┴──────┐       ┌─────────────┐       │
//! │                │ Classifier  │       │ PostgreSQL  │       │
//! │                │ (optional)  │       └─────────────┘       │
//! │                └─────────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod features;
mod handlers;
mod model;
mod models;
mod sink;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::model::InferenceGuard;
use crate::sink::{PgSink, RecordSink};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env().context("Invalid configuration")?;

    init_tracing(config.json_logs);

    tracing::info!("Telemetry collector starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Classifier is optional; without it every record is stored unscored
    let guard = Arc::new(InferenceGuard::new(model::loader::load(config.model_path.as_deref())));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    // Build application state
    let state = AppState {
        sink: PgSink::new(pool),
        guard,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Telemetry collector stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "telemetry_collector=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState<S> {
    pub sink: S,
    pub guard: Arc<InferenceGuard>,
    pub config: Arc<config::Config>,
}

/// Create the main router with all routes
fn create_router<S: RecordSink>(state: AppState<S>) -> Router {
    let cors = cors_layer(&state.config);
    let body_limit = state.config.max_body_bytes;

    Router::new()
        // Liveness
        .route("/", get(handlers::health::home))
        .route("/health", get(handlers::health::check::<S>))
        .route("/status", get(handlers::health::status::<S>))

        // Ingestion
        .route("/collect", post(handlers::collect::collect::<S>))

        // Stored data
        .route("/api/data", get(handlers::records::list::<S>))
        .route("/api/stats", get(handlers::records::stats::<S>))

        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Permissive outside production; allow-list only otherwise
fn cors_layer(config: &config::Config) -> CorsLayer {
    if config.permissive_cors() {
        tracing::info!("CORS: permissive mode enabled");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    tracing::info!("CORS: allowing {} origin(s)", origins.len());

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
