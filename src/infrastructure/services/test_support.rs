//! Service wiring over the in-memory adapters, shared by the service tests

use std::sync::Arc;

use crate::config::GrantScope;
use crate::domain::assignment::{AssignmentType, DirectoryEntry};
use crate::domain::capability::{Capability, CapabilityChecker};
use crate::domain::ids::{ContextId, UserId};
use crate::domain::notification::DeliveryChannelResolver;
use crate::domain::workflow::{StageType, Workflow};
use crate::infrastructure::assignment::InMemoryAssignmentDirectory;
use crate::infrastructure::capability::GrantCapabilityChecker;
use crate::infrastructure::notification::{InMemoryEventSink, StaticDeliveryChannelResolver};
use crate::infrastructure::storage::InMemoryApprovalStore;

use super::application_service::ApplicationService;
use super::cloner::WorkflowCloner;
use super::workflow_service::{
    create_category_context, AddApproverRequest, CreateWorkflowRequest, WorkflowService,
};

pub(crate) const SYSTEM: UserId = UserId::new(1);
pub(crate) const ADMIN: UserId = UserId::new(2);
pub(crate) const APPLICANT: UserId = UserId::new(10);
pub(crate) const MANAGER: UserId = UserId::new(20);

pub(crate) struct Harness {
    pub store: Arc<InMemoryApprovalStore>,
    pub events: Arc<InMemoryEventSink>,
    pub workflows: WorkflowService,
    pub applications: ApplicationService,
    pub cloner: WorkflowCloner,
    pub category_context_id: ContextId,
}

impl Harness {
    /// Published workflow: a form submission stage, the given stages
    /// (approvals stages with their level count) and a finished stage
    pub async fn published_workflow(&self, shape: &[(StageType, usize)]) -> Workflow {
        let workflow = self
            .workflows
            .create(
                CreateWorkflowRequest::new("Leave", "leave", AssignmentType::Organisation, 1),
                ADMIN,
            )
            .await
            .unwrap();
        let version_id = self.workflows.latest_version(workflow.id()).await.unwrap().id();

        self.workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        for (index, (stage_type, levels)) in shape.iter().enumerate() {
            let stage = self
                .workflows
                .add_stage(version_id, &format!("Stage {}", index + 1), *stage_type, ADMIN)
                .await
                .unwrap();
            for _ in 1..*levels {
                self.workflows
                    .add_approval_level(stage.id(), "", ADMIN)
                    .await
                    .unwrap();
            }
        }
        self.workflows
            .add_stage(version_id, "Done", StageType::Finished, ADMIN)
            .await
            .unwrap();

        self.workflows.publish(version_id, ADMIN).await.unwrap();
        self.add_approver_everywhere(&workflow, MANAGER).await;
        workflow
    }

    /// Makes `user_id` an approver of every level of the latest version
    pub async fn add_approver_everywhere(&self, workflow: &Workflow, user_id: UserId) {
        let details = self.workflows.get(workflow.id()).await.unwrap();
        for level in details.stages.iter().flat_map(|s| s.approval_levels.iter()) {
            self.workflows
                .add_approver(AddApproverRequest::new(workflow.id(), level.id(), user_id), ADMIN)
                .await
                .unwrap();
        }
    }
}

fn default_checker() -> GrantCapabilityChecker {
    GrantCapabilityChecker::new()
        .grant_all(ADMIN)
        .grant(APPLICANT, Capability::CreateApplication, GrantScope::Owner)
        .grant(APPLICANT, Capability::EditDraftApplication, GrantScope::Applicant)
        .grant(APPLICANT, Capability::WithdrawUnsubmittedApplication, GrantScope::Applicant)
        .grant(APPLICANT, Capability::WithdrawInApprovalsApplication, GrantScope::Applicant)
        .grant(MANAGER, Capability::ApproveApplication, GrantScope::Any)
}

fn default_channels() -> StaticDeliveryChannelResolver {
    StaticDeliveryChannelResolver::new(vec!["email".to_string(), "popup".to_string()])
}

pub(crate) async fn harness() -> Harness {
    build(Arc::new(default_checker()), Arc::new(default_channels())).await
}

pub(crate) async fn harness_with_checker(checker: Arc<dyn CapabilityChecker>) -> Harness {
    build(checker, Arc::new(default_channels())).await
}

pub(crate) async fn harness_with_channels(channels: Arc<dyn DeliveryChannelResolver>) -> Harness {
    build(Arc::new(default_checker()), channels).await
}

async fn build(
    capabilities: Arc<dyn CapabilityChecker>,
    channels: Arc<dyn DeliveryChannelResolver>,
) -> Harness {
    let store = Arc::new(InMemoryApprovalStore::new());
    let events = Arc::new(InMemoryEventSink::new());
    let directory = Arc::new(
        InMemoryAssignmentDirectory::new()
            .with_entry(
                AssignmentType::Organisation,
                DirectoryEntry {
                    id: 1,
                    name: "Finance".to_string(),
                    id_number: String::new(),
                },
            )
            .with_entry(
                AssignmentType::Cohort,
                DirectoryEntry {
                    id: 5,
                    name: String::new(),
                    id_number: String::new(),
                },
            ),
    );

    let category = create_category_context(store.as_ref()).await.unwrap();

    Harness {
        workflows: WorkflowService::new(
            store.clone(),
            capabilities.clone(),
            directory.clone(),
            events.clone(),
            category.id(),
        ),
        applications: ApplicationService::new(
            store.clone(),
            capabilities.clone(),
            events.clone(),
            SYSTEM,
        ),
        cloner: WorkflowCloner::new(store.clone(), capabilities, directory, channels, events.clone()),
        store,
        events,
        category_context_id: category.id(),
    }
}
