//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MetricsConfig;

static NUMERIC_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/\d+\b").ok());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("path", &self.path)
            .finish()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("approval_engine_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path: config.path.clone(),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router<S>(metrics: PrometheusMetrics) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let path = metrics.path().to_string();
    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record an applied application action
pub fn record_transition(stage_type: &str, action: &str, status: &str) {
    let labels = [
        ("stage_type", stage_type.to_string()),
        ("action", action.to_string()),
        ("status", status.to_string()),
    ];
    counter!("approval_transitions_total", &labels).increment(1);
}

/// Record a refused application action
pub fn record_rejection(action: &str, reason: &str) {
    let labels = [("action", action.to_string()), ("reason", reason.to_string())];
    counter!("approval_rejections_total", &labels).increment(1);
}

/// Record a workflow clone attempt
pub fn record_clone(success: bool, duration: Duration) {
    let labels = [(
        "status",
        if success { "success" } else { "error" }.to_string(),
    )];
    counter!("approval_workflow_clones_total", &labels).increment(1);
    histogram!("approval_workflow_clone_duration_seconds", &labels)
        .record(duration.as_secs_f64());
}

/// Sanitize URL path for metric labels (replace ids, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = match NUMERIC_SEGMENT.as_ref() {
        Some(re) => re.replace_all(path, "/{id}").into_owned(),
        None => path.to_string(),
    };

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path
    }
}
