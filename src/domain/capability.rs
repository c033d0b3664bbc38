//! Capabilities and the authorization seam

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::application::ActionType;
use crate::domain::error::DomainError;
use crate::domain::ids::{ApprovalLevelId, AssignmentId, ContextId, UserId};

#[cfg(test)]
use mockall::automock;

/// Capability prefix of the approval module
pub const CAPABILITY_PREFIX: &str = "mod/approval:";

/// Permission the engine checks before acting for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateApplication,
    EditDraftApplication,
    WithdrawUnsubmittedApplication,
    ApproveApplication,
    WithdrawInApprovalsApplication,
    EditInApprovalsApplication,
    CreateWorkflow,
    CloneWorkflow,
    EditDraftWorkflow,
    ManageWorkflowStages,
    ActivateWorkflow,
    ArchiveWorkflow,
    ManageWorkflows,
    ManageIndividualWorkflowApprovers,
}

impl Capability {
    pub const ALL: [Capability; 14] = [
        Capability::CreateApplication,
        Capability::EditDraftApplication,
        Capability::WithdrawUnsubmittedApplication,
        Capability::ApproveApplication,
        Capability::WithdrawInApprovalsApplication,
        Capability::EditInApprovalsApplication,
        Capability::CreateWorkflow,
        Capability::CloneWorkflow,
        Capability::EditDraftWorkflow,
        Capability::ManageWorkflowStages,
        Capability::ActivateWorkflow,
        Capability::ArchiveWorkflow,
        Capability::ManageWorkflows,
        Capability::ManageIndividualWorkflowApprovers,
    ];

    /// Capability required to take an application action
    pub fn for_action(action: ActionType) -> Self {
        match action {
            ActionType::Submit => Self::EditDraftApplication,
            ActionType::Approve | ActionType::Reject => Self::ApproveApplication,
            ActionType::WithdrawBeforeSubmission => Self::WithdrawUnsubmittedApplication,
            ActionType::WithdrawInApprovals => Self::WithdrawInApprovalsApplication,
            ActionType::ResetApprovals => Self::EditInApprovalsApplication,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::CreateApplication => "create_application",
            Self::EditDraftApplication => "edit_draft_application",
            Self::WithdrawUnsubmittedApplication => "withdraw_unsubmitted_application",
            Self::ApproveApplication => "approve_application",
            Self::WithdrawInApprovalsApplication => "withdraw_in_approvals_application",
            Self::EditInApprovalsApplication => "edit_in_approvals_application",
            Self::CreateWorkflow => "create_workflow",
            Self::CloneWorkflow => "clone_workflow",
            Self::EditDraftWorkflow => "edit_draft_workflow",
            Self::ManageWorkflowStages => "manage_workflow_stages",
            Self::ActivateWorkflow => "activate_workflow",
            Self::ArchiveWorkflow => "archive_workflow",
            Self::ManageWorkflows => "manage_workflows",
            Self::ManageIndividualWorkflowApprovers => "manage_individual_workflow_approvers",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.short_name() == name)
    }

    /// Full name, e.g. `mod/approval:approve_application`
    pub fn name(&self) -> String {
        format!("{}{}", CAPABILITY_PREFIX, self.short_name())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CAPABILITY_PREFIX, self.short_name())
    }
}

/// Where a capability is exercised
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CapabilityScope {
    pub context_id: ContextId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<AssignmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_level_id: Option<ApprovalLevelId>,
}

impl CapabilityScope {
    pub fn context(context_id: ContextId) -> Self {
        Self {
            context_id,
            ..Self::default()
        }
    }

    pub fn with_assignment(mut self, assignment_id: AssignmentId) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }

    pub fn with_applicant(mut self, applicant_id: UserId) -> Self {
        self.applicant_id = Some(applicant_id);
        self
    }

    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_approval_level(mut self, level_id: Option<ApprovalLevelId>) -> Self {
        self.approval_level_id = level_id;
        self
    }
}

/// Authorization policy consulted before every transition and clone
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CapabilityChecker: Send + Sync {
    async fn can(
        &self,
        actor: UserId,
        capability: Capability,
        scope: &CapabilityScope,
    ) -> Result<bool, DomainError>;
}
