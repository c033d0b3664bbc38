//! API middleware and extractors

pub mod actor;
pub mod metrics;

pub use actor::{Actor, ACTOR_HEADER};
pub use metrics::metrics_middleware;
