//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::health::{health, ready};
use crate::handlers::music::{music_options, select_music};
use crate::handlers::projects::{
    approve_images, delete_project, get_project, like_moodboards, set_moodboards, start_project,
    update_scenes,
};
use crate::handlers::videos::{compose_project, get_status, start_videos};
use crate::handlers::webhook::provider_webhook;
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let project_routes = Router::new()
        .route("/projects/start", post(start_project))
        .route("/projects/:project_id", get(get_project))
        .route("/projects/:project_id", delete(delete_project))
        .route("/projects/:project_id/moodboards", post(set_moodboards))
        .route("/projects/:project_id/moodboards/like", post(like_moodboards))
        .route("/projects/:project_id/scenes", put(update_scenes))
        .route(
            "/projects/:project_id/scenes/images/approve",
            post(approve_images),
        );

    let render_routes = Router::new()
        .route("/projects/:project_id/videos/start", post(start_videos))
        .route("/projects/:project_id/status", get(get_status))
        .route("/projects/:project_id/compose", post(compose_project));

    let music_routes = Router::new()
        .route("/music/options", get(music_options))
        .route("/projects/:project_id/music/select", post(select_music));

    // Provider callbacks carry no session token; the run reference is the
    // only correlation key.
    let webhook_routes = Router::new().route("/webhook/provider", post(provider_webhook));

    let api_routes = Router::new()
        .merge(project_routes)
        .merge(render_routes)
        .merge(music_routes)
        .merge(webhook_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
