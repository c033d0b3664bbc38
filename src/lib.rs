//! Approval Engine
//!
//! Configurable multi-stage approval workflows:
//! - Versioned workflows with typed stages, approval levels, formviews and interactions
//! - Applications driven through stages by a capability-checked action pipeline
//! - Workflow cloning with assignment retargeting and notification preferences
//! - Activity log and domain events for every state change

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::assignment::{DirectoryEntry, UntitledLabels};
use domain::capability::CapabilityChecker;
use domain::ids::UserId;
use domain::notification::EventSink;
use domain::storage::ApprovalStore;
use infrastructure::{
    assignment::InMemoryAssignmentDirectory,
    capability::GrantCapabilityChecker,
    notification::{StaticDeliveryChannelResolver, TracingEventSink},
    services::{create_category_context, ApplicationService, WorkflowCloner, WorkflowService},
    storage::InMemoryApprovalStore,
};
use tracing::info;

/// Create the application state over a fresh in-memory store
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    create_app_state_with_events(config, Arc::new(TracingEventSink::new())).await
}

/// Create the application state, publishing domain events to `events`
pub async fn create_app_state_with_events(
    config: &AppConfig,
    events: Arc<dyn EventSink>,
) -> anyhow::Result<AppState> {
    let approval = &config.approval;

    let store: Arc<dyn ApprovalStore> = Arc::new(InMemoryApprovalStore::new());
    let capabilities: Arc<dyn CapabilityChecker> =
        Arc::new(GrantCapabilityChecker::from_config(&approval.grants)?);
    let directory = Arc::new(approval.directory.iter().fold(
        InMemoryAssignmentDirectory::new(),
        |directory, entry| {
            directory.with_entry(
                entry.assignment_type,
                DirectoryEntry {
                    id: entry.id,
                    name: entry.name.clone(),
                    id_number: entry.id_number.clone(),
                },
            )
        },
    ));
    let channels = Arc::new(
        StaticDeliveryChannelResolver::new(approval.delivery_channels.clone())
            .with_defaults(approval.resolver_channels.clone()),
    );
    let labels = UntitledLabels::new(approval.untitled_labels.clone());

    let category = create_category_context(store.as_ref()).await?;
    info!(
        category_context_id = %category.id(),
        grants = approval.grants.len(),
        directory_entries = approval.directory.len(),
        "Approval engine initialized"
    );

    let workflows = WorkflowService::new(
        store.clone(),
        capabilities.clone(),
        directory.clone(),
        events.clone(),
        category.id(),
    )
    .with_untitled_labels(labels.clone());
    let applications = ApplicationService::new(
        store.clone(),
        capabilities.clone(),
        events.clone(),
        UserId::new(approval.system_user_id),
    );
    let cloner = WorkflowCloner::new(store, capabilities, directory, channels, events)
        .with_untitled_labels(labels);

    Ok(AppState::new(workflows, applications, cloner))
}
