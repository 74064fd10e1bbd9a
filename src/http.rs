//! HTTP API.
//!
//! Serves recent messages per channel and, when enabled, Prometheus metrics
//! on `/metrics`.

use crate::container::AppendOptions;
use crate::error::ApiError;
use crate::service::{RecentMessages, RecentMessagesResponse};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::broadcast;

#[derive(Clone)]
struct AppState {
    service: RecentMessages,
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

async fn serve_recent_messages(
    state: &AppState,
    api: &str,
    channel: &str,
    options: AppendOptions,
) -> Result<Json<RecentMessagesResponse>, ApiError> {
    let started = Instant::now();
    let channel = RecentMessages::normalize_channel(channel)?;
    let response = state.service.recent_messages(&channel, options).await?;
    crate::metrics::record_export(api, started.elapsed().as_secs_f64());
    Ok(Json(response))
}

/// GET /api/v2/recent-messages/:channel
async fn recent_messages_v2(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    query: Result<Query<AppendOptions>, QueryRejection>,
) -> Result<Json<RecentMessagesResponse>, ApiError> {
    let Query(options) =
        query.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    serve_recent_messages(&state, "v2", &channel, options).await
}

/// GET /api/v1/recent-messages/:channel
///
/// Legacy clients only understand PRIVMSG, so conversion is forced and all
/// other flags are ignored.
async fn recent_messages_v1(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<RecentMessagesResponse>, ApiError> {
    let options = AppendOptions {
        privmsg_only: true,
        ..AppendOptions::default()
    };
    serve_recent_messages(&state, "v1", &channel, options).await
}

/// Build the API router.
pub fn router(service: RecentMessages, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v2/recent-messages/:channel", get(recent_messages_v2))
        .route("/api/v1/recent-messages/:channel", get(recent_messages_v1));

    if metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.fallback(not_found).with_state(AppState { service })
}

/// Run the HTTP API until `shutdown` fires.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(
    addr: SocketAddr,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) {
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    tracing::info!(addr = %addr, "HTTP API listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    });
    if let Err(e) = serve.await {
        tracing::error!(error = %e, "HTTP server error");
    }
}
