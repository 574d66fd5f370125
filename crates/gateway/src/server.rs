use std::future::Future;

use {
    axum::{
        Router,
        extract::State,
        http::{StatusCode, header},
        response::{IntoResponse, Json, Response},
        routing::get,
    },
    serde::{Deserialize, Serialize},
    tokio::net::TcpListener,
    tracing::info,
    wagpt_channels::{SessionState, StateObserver},
    wagpt_metrics::MetricsHandle,
};

#[derive(Clone)]
pub struct AppState {
    pub version: &'static str,
    pub session: StateObserver,
    pub metrics: MetricsHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339.
    pub timestamp: String,
    pub version: String,
    pub whatsapp: SessionState,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "health server listening");
    }
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("health server stopped");
    Ok(())
}

/// Always 200 while the process runs; the session state is informational.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: state.version.into(),
        whatsapp: state.session.current(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    if !state.metrics.is_enabled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled",
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.render(),
    )
        .into_response()
}
