use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::assignment::AssignmentType;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// Which applications a capability grant covers
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GrantScope {
    /// Every application and workflow
    #[default]
    Any,
    /// Applications the user applied for
    Applicant,
    /// Applications the user created
    Owner,
}

/// A capability granted to one user
#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    pub user_id: i64,
    /// Short capability name, e.g. `approve_application`
    pub capability: String,
    #[serde(default)]
    pub scope: GrantScope,
}

/// An organisation, position or cohort workflows can be assigned to
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryEntryConfig {
    pub assignment_type: AssignmentType,
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id_number: String,
}

/// Approval engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalConfig {
    /// User id recorded for system-driven transitions
    #[serde(default = "default_system_user")]
    pub system_user_id: i64,
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
    /// Channels every resolver can deliver through
    #[serde(default = "default_channels")]
    pub delivery_channels: Vec<String>,
    /// Default channels per resolver class; missing resolvers use `delivery_channels`
    #[serde(default)]
    pub resolver_channels: HashMap<String, Vec<String>>,
    /// Labels of untitled assignment targets, keyed `untitled_<type>`
    #[serde(default)]
    pub untitled_labels: HashMap<String, String>,
    /// Entities seeded into the assignment directory
    #[serde(default)]
    pub directory: Vec<DirectoryEntryConfig>,
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_system_user() -> i64 {
    2
}

fn default_channels() -> Vec<String> {
    vec!["email".to_string(), "popup".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            system_user_id: default_system_user(),
            grants: Vec::new(),
            delivery_channels: default_channels(),
            resolver_channels: HashMap::new(),
            untitled_labels: HashMap::new(),
            directory: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
