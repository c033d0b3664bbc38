//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_clone, record_http_request, record_rejection,
    record_transition, PrometheusMetrics,
};
