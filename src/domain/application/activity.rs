//! Activity types recorded while an application moves through its workflow

use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::ActionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Creation,
    StageStarted,
    StageSubmitted,
    StageAllApproved,
    StageEnded,
    LevelStarted,
    LevelApproved,
    LevelRejected,
    LevelEnded,
    ApprovalsReset,
    Withdrawn,
    Finished,
}

impl ActivityType {
    /// Activity recorded for the action itself, before any stage movement
    pub fn for_action(action: ActionType) -> Self {
        match action {
            ActionType::Submit => Self::StageSubmitted,
            ActionType::Approve => Self::LevelApproved,
            ActionType::Reject => Self::LevelRejected,
            ActionType::WithdrawBeforeSubmission | ActionType::WithdrawInApprovals => {
                Self::Withdrawn
            }
            ActionType::ResetApprovals => Self::ApprovalsReset,
        }
    }

    /// Whether the activity belongs to the state being entered rather than
    /// the one being left
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            Self::Creation | Self::StageStarted | Self::LevelStarted | Self::Finished
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::StageStarted => "stage_started",
            Self::StageSubmitted => "stage_submitted",
            Self::StageAllApproved => "stage_all_approved",
            Self::StageEnded => "stage_ended",
            Self::LevelStarted => "level_started",
            Self::LevelApproved => "level_approved",
            Self::LevelRejected => "level_rejected",
            Self::LevelEnded => "level_ended",
            Self::ApprovalsReset => "approvals_reset",
            Self::Withdrawn => "withdrawn",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
