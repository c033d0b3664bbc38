//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, ApprovalConfig, DirectoryEntryConfig, GrantConfig, GrantScope, LogFormat,
    LoggingConfig, MetricsConfig, ServerConfig,
};
