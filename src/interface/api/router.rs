//! API Router configuration

use super::calls_handler::{dial_call, get_call_status, list_calls, AppState};
use super::media_handler::media_stream_handler;
use super::metrics_handler::metrics_handler;
use super::monitoring::get_system_health;
use super::notifications_handler::publish_notification;
use super::ws_handler::{ws_handler, WsState};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(
    state: AppState,
    prometheus_handle: PrometheusHandle,
    ws_state: WsState,
) -> Router {
    // Health check route (no auth required)
    let health_routes = Router::new().route("/health", get(get_system_health));

    // Call management routes
    let call_routes = Router::new()
        .route("/calls", post(dial_call))
        .route("/calls", get(list_calls))
        .route("/calls/:call_sid", get(get_call_status));

    // Notification publish route
    let notification_routes = Router::new().route("/notifications", post(publish_notification));

    // Carrier media stream route
    let media_routes = Router::new().route("/media-stream", get(media_stream_handler));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    // Notification WebSocket route (separate state)
    let ws_routes = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(ws_state);

    // Combine routes with state
    Router::new()
        .merge(health_routes)
        .merge(call_routes)
        .merge(notification_routes)
        .merge(media_routes)
        .with_state(state)
        .merge(metrics_routes)
        .merge(ws_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
