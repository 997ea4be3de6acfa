//! Axum server setup and routing

use crate::routes;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Catalog
        .route("/api/videos", get(routes::get_videos))
        .route("/api/videos/:index", axum::routing::put(routes::update_video))
        .route("/api/tags", get(routes::get_tags))
        .route("/api/tags/stats", get(routes::get_tag_stats))
        .route("/api/scan", post(routes::scan_videos))
        .route("/api/last_path", get(routes::get_last_path).post(routes::save_last_path))
        // Thumbnails
        .route("/api/thumbnail", get(routes::serve_thumbnail))
        .route("/api/upload_thumbnail/:index", post(routes::upload_thumbnail))
        .route("/api/multi_thumbnail", get(routes::serve_multi_thumbnail))
        .route("/api/videos/:index/multi_thumbnails", get(routes::get_multi_thumbnails))
        .route("/api/videos/:index/generate_thumbnails", post(routes::generate_thumbnails))
        .route("/api/videos/:index/thumbnail_progress", get(routes::get_thumbnail_progress))
        .route("/api/videos/:index/video_info", get(routes::get_video_info))
        // Subtitles
        .route("/api/videos/:index/subtitles", get(routes::get_subtitles))
        .route("/api/videos/:index/upload_subtitle", post(routes::upload_subtitle))
        .route("/api/videos/:index/delete_subtitle", delete(routes::delete_subtitle))
        .route("/api/subtitle", get(routes::serve_subtitle))
        .route("/api/convert_subtitle", post(routes::convert_subtitle))
        // Video streaming
        .route("/api/stream_video", get(routes::stream_video))
        // Frontend assets
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .with_state(state)
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Start the web server and run until `shutdown` resolves
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);

    info!("starting vidshelf api on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("server stopped");
    Ok(())
}
