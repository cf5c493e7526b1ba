pub mod handlers;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::page::handle_index))
        .route("/video_feed", get(handlers::video::handle_video_feed))
        .route("/stats", get(handlers::status::handle_stats))
        .route("/coords", get(handlers::status::handle_coords))
        .route("/direction", post(handlers::direction::handle_direction))
        .with_state(state)
        .layer(cors)
}

/// Serve the viewer's HTTP surface until shutdown is signalled.
pub async fn serve(
    state: ApiState,
    addr: SocketAddr,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
