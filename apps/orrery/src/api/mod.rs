//! # HTTP API Module
//!
//! Axum server exposing the universe over HTTP.
//!
//! ## Endpoints
//!
//! Open (mode-projected):
//! - `GET /health` - liveness, exempt from auth and rate limiting
//! - `GET /nodes/{id}` - node detail for the effective mode
//! - `GET /clusters` - clusters with derived level/score/velocity
//! - `GET /stats` - universe totals
//!
//! Owner (401 without the private secret):
//! - `GET /learning-gaps`, `PATCH /learning-gaps/{id}`
//! - `GET /opportunities/intelligent`, `PATCH /opportunities/{id}`
//! - `GET /verification-queue`, `POST /verify`, `POST /verify-batch`
//! - `POST /nodes`, `POST /edges`
//! - `POST /generate-outreach`
//! - `GET /export`
//!
//! ## Configuration
//!
//! - `ORRERY_PRIVATE_SECRET` / `ORRERY_PARTNER_SECRET`: access secrets
//! - `ORRERY_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `ORRERY_RATE_LIMIT`: requests per second, `0` disables

use crate::config::ServerConfig;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use orrery_core::{OrreryError, Universe};
use orrery_llm::Generator;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod types;

// Re-exported for integration tests.
#[allow(unused_imports)]
pub use handlers::*;
#[allow(unused_imports)]
pub use types::*;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// The universe behind an async RwLock: concurrent reads, exclusive
    /// writes.
    pub universe: Arc<RwLock<Universe>>,
    /// Text generator backend. Cheap to clone.
    pub generator: Generator,
}

impl AppState {
    /// Create state from an opened universe and a generator backend.
    pub fn new(universe: Universe, generator: Generator) -> Self {
        Self {
            universe: Arc::new(RwLock::new(universe)),
            generator,
        }
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Build the CORS layer from the configured origin list.
///
/// `None` falls back to the localhost development origins. A list
/// containing `"*"` allows any origin; that is logged loudly because it
/// belongs in development only.
fn build_cors_layer(configured: Option<&[String]>) -> CorsLayer {
    match configured {
        Some(origins) if origins.iter().any(|o| o == "*") => {
            tracing::warn!("CORS: allowing any origin");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let mut parsed: Vec<HeaderValue> = Vec::new();
            for origin in origins {
                match HeaderValue::from_str(origin) {
                    Ok(value) => {
                        tracing::info!(origin = %origin, "CORS: allowing origin");
                        parsed.push(value);
                    }
                    Err(_) => {
                        tracing::warn!(origin = %origin, "CORS: skipping unparseable origin");
                    }
                }
            }
            if parsed.is_empty() {
                tracing::warn!("CORS: no usable origins configured, falling back to localhost");
                localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(parsed)
                    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
                    .allow_headers([
                        header::CONTENT_TYPE,
                        HeaderName::from_static(auth::AUTH_HEADER),
                    ])
            }
        }
        None => {
            tracing::info!("CORS: defaulting to localhost development origins");
            localhost_cors()
        }
    }
}

/// The development default: common localhost frontend ports.
fn localhost_cors() -> CorsLayer {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://localhost:8080"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://127.0.0.1:8080"),
    ];
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::AUTH_HEADER),
        ])
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the router with all middleware layers applied.
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config.cors_origins.as_deref());

    let rate_limiter = if config.rate_limit > 0 {
        tracing::info!(
            requests_per_second = config.rate_limit,
            "Rate limiting enabled"
        );
        Some(middleware::create_rate_limiter(config.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    if auth::private_secret_from_env().is_none() {
        tracing::warn!("ORRERY_PRIVATE_SECRET not set - owner endpoints will answer 401");
    }
    if auth::partner_secret_from_env().is_none() {
        tracing::info!("ORRERY_PARTNER_SECRET not set - partner mode disabled");
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/nodes", post(handlers::node_insert_handler))
        .route("/nodes/{id}", get(handlers::node_handler))
        .route("/clusters", get(handlers::clusters_handler))
        .route("/stats", get(handlers::stats_handler))
        .route("/learning-gaps", get(handlers::gaps_handler))
        .route("/learning-gaps/{id}", patch(handlers::gap_update_handler))
        .route(
            "/opportunities/intelligent",
            get(handlers::opportunities_handler),
        )
        .route(
            "/opportunities/{id}",
            patch(handlers::opportunity_moderate_handler),
        )
        .route("/verification-queue", get(handlers::queue_handler))
        .route("/verify", post(handlers::verify_handler))
        .route("/verify-batch", post(handlers::verify_batch_handler))
        .route("/edges", post(handlers::edge_insert_handler))
        .route("/generate-outreach", post(handlers::outreach_handler))
        .route("/export", get(handlers::export_handler));

    router = router.layer(axum_middleware::from_fn(auth::access_mode_middleware));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024)) // 2 MB
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER
// =============================================================================

/// Bind and serve until the process receives a shutdown signal.
pub async fn run_server(config: &ServerConfig, state: AppState) -> Result<(), OrreryError> {
    let router = create_router(state, config);
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| OrreryError::IoError(format!("Bind failed: {}", e)))?;
    tracing::info!("Orrery server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| OrreryError::IoError(format!("Server error: {}", e)))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
