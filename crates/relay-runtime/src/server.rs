//! Axum-based runtime host.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::invocation::invocations_handler;
use crate::state::RuntimeState;
use crate::websocket::ws_handler;

/// Routes: `POST /invocations`, `GET /ping`, `GET /ws`.
pub fn build_router(state: Arc<RuntimeState>) -> Router {
    Router::new()
        .route("/invocations", post(invocations_handler))
        .route("/ping", get(ping_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the runtime host on the configured bind address and port.
pub async fn start_runtime(state: Arc<RuntimeState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind(), state.config.port());
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        mode = ?state.config.response_mode(),
        "Runtime listening on {addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn ping_handler(State(state): State<Arc<RuntimeState>>) -> impl IntoResponse {
    Json(state.ping())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(%e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    }
}
