//! Events emitted by the engine after a successful commit

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ApplicationCreated,
    ApplicationActionApplied,
    ApplicationProgressed,
    ActivityCreated,
    ApplicationSubmitted,
    ApplicationRejected,
    ApplicationWithdrawn,
    ApplicationCompleted,
    WorkflowCreated,
    WorkflowCloned,
    WorkflowPublished,
    WorkflowArchived,
    WorkflowUnarchived,
    WorkflowDeleted,
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApplicationCreated => "application_created",
            Self::ApplicationActionApplied => "application_action_applied",
            Self::ApplicationProgressed => "application_progressed",
            Self::ActivityCreated => "activity_created",
            Self::ApplicationSubmitted => "application_submitted",
            Self::ApplicationRejected => "application_rejected",
            Self::ApplicationWithdrawn => "application_withdrawn",
            Self::ApplicationCompleted => "application_completed",
            Self::WorkflowCreated => "workflow_created",
            Self::WorkflowCloned => "workflow_cloned",
            Self::WorkflowPublished => "workflow_published",
            Self::WorkflowArchived => "workflow_archived",
            Self::WorkflowUnarchived => "workflow_unarchived",
            Self::WorkflowDeleted => "workflow_deleted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives named events; recipients and message formatting are its concern
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event_type: EventType, payload: serde_json::Value) -> Result<(), DomainError>;
}
