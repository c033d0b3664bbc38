//! Position of an application in its workflow version

use std::fmt;

use serde::{Deserialize, Serialize};

use super::activity::ActivityType;
use crate::domain::ids::{ApprovalLevelId, StageId};
use crate::domain::workflow::StageType;

/// Overall status of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    InProgress,
    Rejected,
    Withdrawn,
    Completed,
}

impl ApplicationStatus {
    /// No action can be applied once an application reaches a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Withdrawn | Self::Completed)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Withdrawn => write!(f, "WITHDRAWN"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Stage, approval level and draft flag of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    stage_id: StageId,
    stage_type: StageType,
    approval_level_id: Option<ApprovalLevelId>,
    is_draft: bool,
}

impl ApplicationState {
    pub fn new(
        stage_id: StageId,
        stage_type: StageType,
        approval_level_id: Option<ApprovalLevelId>,
        is_draft: bool,
    ) -> Self {
        Self {
            stage_id,
            stage_type,
            approval_level_id,
            is_draft,
        }
    }

    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    pub fn stage_type(&self) -> StageType {
        self.stage_type
    }

    pub fn approval_level_id(&self) -> Option<ApprovalLevelId> {
        self.approval_level_id
    }

    pub fn is_draft(&self) -> bool {
        self.is_draft
    }

    pub fn is_stage_type(&self, stage_type: StageType) -> bool {
        self.stage_type == stage_type
    }

    pub fn is_same_stage(&self, other: &ApplicationState) -> bool {
        self.stage_id == other.stage_id
    }
}

/// Outcome computed by a state manager for one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ApplicationState,
    pub to: ApplicationState,
    pub status: ApplicationStatus,
    /// Activities in the order they happened
    pub activities: Vec<ActivityType>,
}

impl Transition {
    pub fn moves(&self) -> bool {
        self.from != self.to
    }
}
