//! Approvers of an assignment's approval levels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ApprovalLevelId, AssignmentApproverId, AssignmentId, UserId};
use crate::domain::storage::StorageEntity;

/// A user who signs off one approval level for applications made through
/// one assignment.
///
/// Removing an approver deactivates the row; adding the same user back
/// reactivates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentApprover {
    id: AssignmentApproverId,
    assignment_id: AssignmentId,
    approval_level_id: ApprovalLevelId,
    user_id: UserId,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssignmentApprover {
    pub fn new(assignment_id: AssignmentId, approval_level_id: ApprovalLevelId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: AssignmentApproverId::UNSAVED,
            assignment_id,
            approval_level_id,
            user_id,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active copy for another assignment and level, not yet persisted
    pub fn clone_into(&self, assignment_id: AssignmentId, approval_level_id: ApprovalLevelId) -> Self {
        Self::new(assignment_id, approval_level_id, self.user_id)
    }

    pub fn id(&self) -> AssignmentApproverId {
        self.id
    }

    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    pub fn approval_level_id(&self) -> ApprovalLevelId {
        self.approval_level_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Same assignment, level and user, active or not
    pub fn matches(&self, assignment_id: AssignmentId, level_id: ApprovalLevelId, user_id: UserId) -> bool {
        self.assignment_id == assignment_id
            && self.approval_level_id == level_id
            && self.user_id == user_id
    }

    /// Whether this row lets `user_id` act at `level_id` of `assignment_id`
    pub fn authorizes(&self, assignment_id: AssignmentId, level_id: ApprovalLevelId, user_id: UserId) -> bool {
        self.active && self.matches(assignment_id, level_id, user_id)
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for AssignmentApprover {
    type Key = AssignmentApproverId;
    const TABLE: &'static str = "assignment_approver";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}
