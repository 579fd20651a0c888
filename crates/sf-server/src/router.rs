//! Axum router construction.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    // Browser players fetch manifests and segments cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Streaming
        .route("/stream/{file}/manifest.mpd", get(routes::stream::manifest))
        .route("/stream/{file}/streams", get(routes::stream::streams))
        .route(
            "/stream/{file}/{stream}/{repr}/{segment}",
            get(routes::stream::segment),
        )
        // Sessions
        .route(
            "/sessions",
            get(routes::sessions::list_sessions).delete(routes::sessions::destroy_sessions),
        )
        // Metadata
        .route("/metadata/series", get(routes::metadata::list_series))
        .route(
            "/metadata/episode-files",
            post(routes::metadata::register_episode_file),
        )
        .route(
            "/metadata/episode-files/{id}",
            delete(routes::metadata::remove_episode_file),
        );

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
