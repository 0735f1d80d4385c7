use super::api::{get_invocation, health_check, metrics, AppState};
use crate::config::WebConfig;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/collectors/:name/invocation", get(get_invocation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the status endpoints until `shutdown` fires.
pub async fn run_server(
    state: Arc<AppState>,
    web_config: WebConfig,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&web_config.listen).await?;
    tracing::info!("Web server listening on {}", web_config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("Web server shutting down gracefully");
        })
        .await
}
