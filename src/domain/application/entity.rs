//! Application entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::ActionType;
use super::state::{ApplicationState, ApplicationStatus, Transition};
use crate::domain::ids::{
    ApplicationId, ApprovalLevelId, AssignmentId, StageId, UserId, WorkflowVersionId,
};
use crate::domain::storage::StorageEntity;

/// A user's instance of a workflow version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    id: ApplicationId,
    workflow_version_id: WorkflowVersionId,
    assignment_id: AssignmentId,
    /// Applicant
    user_id: UserId,
    creator_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitter_id: Option<UserId>,
    current_state: ApplicationState,
    status: ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_action: Option<ActionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    /// Optimistic lock counter, bumped by the store on every update
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        workflow_version_id: WorkflowVersionId,
        assignment_id: AssignmentId,
        user_id: UserId,
        creator_id: UserId,
        state: ApplicationState,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationId::UNSAVED,
            workflow_version_id,
            assignment_id,
            user_id,
            creator_id,
            submitter_id: None,
            status: if state.is_draft() {
                ApplicationStatus::Draft
            } else {
                ApplicationStatus::InProgress
            },
            current_state: state,
            last_action: None,
            submitted_at: None,
            completed_at: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    // Getters

    pub fn id(&self) -> ApplicationId {
        self.id
    }

    pub fn workflow_version_id(&self) -> WorkflowVersionId {
        self.workflow_version_id
    }

    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn creator_id(&self) -> UserId {
        self.creator_id
    }

    pub fn submitter_id(&self) -> Option<UserId> {
        self.submitter_id
    }

    pub fn current_state(&self) -> ApplicationState {
        self.current_state
    }

    pub fn current_stage_id(&self) -> StageId {
        self.current_state.stage_id()
    }

    pub fn current_approval_level_id(&self) -> Option<ApprovalLevelId> {
        self.current_state.approval_level_id()
    }

    pub fn is_draft(&self) -> bool {
        self.current_state.is_draft()
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn last_action(&self) -> Option<ActionType> {
        self.last_action
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn current_revision(&self) -> u64 {
        self.revision
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    /// Moves the application as computed by a state manager
    pub fn apply_transition(&mut self, transition: &Transition, action: Option<ActionType>, actor: UserId) {
        let now = Utc::now();
        self.current_state = transition.to;
        self.status = transition.status;

        if let Some(action) = action {
            self.last_action = Some(action);
            if action == ActionType::Submit {
                self.submitter_id = Some(actor);
                self.submitted_at = Some(now);
            }
        }

        if transition.status == ApplicationStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }
}

impl StorageEntity for Application {
    type Key = ApplicationId;
    const TABLE: &'static str = "application";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }

    fn revision(&self) -> Option<u64> {
        Some(self.revision)
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::ActivityType;
    use crate::domain::workflow::StageType;

    fn draft() -> Application {
        let state = ApplicationState::new(StageId::new(1), StageType::FormSubmission, None, true);
        Application::new(
            WorkflowVersionId::new(1),
            AssignmentId::new(1),
            UserId::new(10),
            UserId::new(10),
            state,
        )
    }

    #[test]
    fn test_new_application_is_draft() {
        let application = draft();
        assert_eq!(application.status(), ApplicationStatus::Draft);
        assert!(application.is_draft());
        assert_eq!(application.revision(), Some(0));
    }

    #[test]
    fn test_apply_submit_records_submitter() {
        let mut application = draft();
        let from = application.current_state();
        let to = ApplicationState::new(
            StageId::new(2),
            StageType::Approvals,
            Some(ApprovalLevelId::new(5)),
            false,
        );
        let transition = Transition {
            from,
            to,
            status: ApplicationStatus::InProgress,
            activities: vec![ActivityType::StageSubmitted],
        };

        application.apply_transition(&transition, Some(ActionType::Submit), UserId::new(11));
        assert_eq!(application.current_stage_id(), StageId::new(2));
        assert_eq!(application.current_approval_level_id(), Some(ApprovalLevelId::new(5)));
        assert_eq!(application.submitter_id(), Some(UserId::new(11)));
        assert!(application.submitted_at().is_some());
        assert!(application.completed_at().is_none());
        assert_eq!(application.last_action(), Some(ActionType::Submit));
    }
}
