//! `api` crate: HTTP REST API layer.
//!
//! Exposes:
//!   GET    /health
//!   GET    /api/v1/recipes?category=
//!   GET    /api/v1/recipes/trigger-events
//!   GET    /api/v1/automation-rules?org_id=
//!   POST   /api/v1/automation-rules/seed
//!   POST   /api/v1/events
//!   GET    /api/v1/events/:event_id/runs?org_id=

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use db::DbPool;
use engine::{ActionExecutor, Catalog};

pub use error::ApiError;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    /// Built-in catalog; used for listing, seeding, and for orgs that have
    /// not seeded their own rules yet.
    pub catalog: Arc<Catalog>,
    pub executor: Arc<ActionExecutor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/recipes", get(handlers::recipes::list))
        .route("/api/v1/recipes/trigger-events", get(handlers::recipes::trigger_events))
        .route("/api/v1/automation-rules", get(handlers::rules::list))
        .route("/api/v1/automation-rules/seed", post(handlers::rules::seed))
        .route("/api/v1/events", post(handlers::events::dispatch))
        .route("/api/v1/events/:event_id/runs", get(handlers::events::runs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}

#[cfg(test)]
mod tests;
