//! Application actions

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ApplicationActionId, ApplicationId, ApprovalLevelId, StageId, UserId};
use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

/// Action a user can take on an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Submit,
    Approve,
    Reject,
    WithdrawBeforeSubmission,
    WithdrawInApprovals,
    ResetApprovals,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::Submit,
        ActionType::Approve,
        ActionType::Reject,
        ActionType::WithdrawBeforeSubmission,
        ActionType::WithdrawInApprovals,
        ActionType::ResetApprovals,
    ];

    /// Persisted code of the action
    pub fn code(&self) -> i32 {
        match self {
            Self::Submit => 1,
            Self::Approve => 2,
            Self::Reject => 3,
            Self::WithdrawBeforeSubmission => 4,
            Self::WithdrawInApprovals => 5,
            Self::ResetApprovals => 6,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|a| a.code() == code)
            .ok_or_else(|| DomainError::validation(format!("Unknown action code {}", code)))
    }

    pub fn enum_name(&self) -> &'static str {
        match self {
            Self::Submit => "SUBMIT",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::WithdrawBeforeSubmission => "WITHDRAW_BEFORE_SUBMISSION",
            Self::WithdrawInApprovals => "WITHDRAW_IN_APPROVALS",
            Self::ResetApprovals => "RESET_APPROVALS",
        }
    }

    pub fn is_withdrawal(&self) -> bool {
        matches!(self, Self::WithdrawBeforeSubmission | Self::WithdrawInApprovals)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.enum_name())
    }
}

/// Immutable record of an action taken on an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationAction {
    id: ApplicationActionId,
    application_id: ApplicationId,
    user_id: UserId,
    workflow_stage_id: StageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_stage_approval_level_id: Option<ApprovalLevelId>,
    action: ActionType,
    code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl ApplicationAction {
    pub fn new(
        application_id: ApplicationId,
        user_id: UserId,
        workflow_stage_id: StageId,
        workflow_stage_approval_level_id: Option<ApprovalLevelId>,
        action: ActionType,
    ) -> Self {
        Self {
            id: ApplicationActionId::UNSAVED,
            application_id,
            user_id,
            workflow_stage_id,
            workflow_stage_approval_level_id,
            action,
            code: action.code(),
            comment: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn id(&self) -> ApplicationActionId {
        self.id
    }

    pub fn application_id(&self) -> ApplicationId {
        self.application_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn workflow_stage_id(&self) -> StageId {
        self.workflow_stage_id
    }

    pub fn approval_level_id(&self) -> Option<ApprovalLevelId> {
        self.workflow_stage_approval_level_id
    }

    pub fn action(&self) -> ActionType {
        self.action
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StorageEntity for ApplicationAction {
    type Key = ApplicationActionId;
    const TABLE: &'static str = "application_action";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_codes_are_unique() {
        for action in ActionType::ALL {
            assert_eq!(ActionType::from_code(action.code()).unwrap(), action);
        }
        assert!(ActionType::from_code(0).is_err());
    }

    #[test]
    fn test_action_record_carries_code() {
        let record = ApplicationAction::new(
            ApplicationId::new(1),
            UserId::new(2),
            StageId::new(3),
            Some(ApprovalLevelId::new(4)),
            ActionType::Reject,
        )
        .with_comment(Some("  missing receipts ".to_string()));

        assert_eq!(record.code(), 3);
        assert_eq!(record.comment(), Some("missing receipts"));
        assert_eq!(record.approval_level_id(), Some(ApprovalLevelId::new(4)));
    }

    #[test]
    fn test_blank_comment_dropped() {
        let record = ApplicationAction::new(
            ApplicationId::new(1),
            UserId::new(2),
            StageId::new(3),
            None,
            ActionType::Submit,
        )
        .with_comment(Some("   ".to_string()));
        assert!(record.comment().is_none());
    }
}
