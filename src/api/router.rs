use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::applications;
use super::health;
use super::middleware::metrics_middleware;
use super::state::AppState;
use super::workflows;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Create the full router with application state
pub fn create_router_with_state(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/workflows", workflows::create_workflows_router())
        .nest("/applications", applications::create_applications_router())
        .with_state(state);

    let router = match metrics {
        Some(metrics) => router.merge(create_metrics_router(metrics)),
        None => router,
    };

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
