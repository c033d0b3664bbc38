//! Workflow service - authoring of workflows, versions and stages

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use super::support::{
    active_version, create_workflow_shell, emit, ensure_capability, latest_version, WorkflowShell,
};
use crate::domain::application::{ActionType, Application};
use crate::domain::assignment::{
    resolve_target, Assignment, AssignmentApprover, AssignmentDirectory, AssignmentStatus,
    AssignmentType, UntitledLabels,
};
use crate::domain::capability::{Capability, CapabilityChecker, CapabilityScope};
use crate::domain::context::{Context, ExtendedContext};
use crate::domain::ids::{
    ApprovalLevelId, AssignmentApproverId, AssignmentId, ContextId, StageId, UserId, WorkflowId,
    WorkflowVersionId,
};
use crate::domain::notification::{
    EventSink, EventType, NotifiableEventPreference, NotificationPreference,
};
use crate::domain::storage::{ApprovalStore, StoreTransaction};
use crate::domain::workflow::{
    ApprovalError, ApprovalLevel, Formview, FormviewVisibility, Interaction,
    InteractionTransition, StageFeature, StageType, VersionGraph, VersionStatus, Workflow,
    WorkflowStage, WorkflowVersion,
};
use crate::domain::DomainError;

/// Name of the approval level every new approvals stage starts with
pub const DEFAULT_LEVEL_NAME: &str = "Level 1";

/// Request to create a new workflow
#[derive(Debug, Clone)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub description: Option<String>,
    pub id_number: Option<String>,
    pub workflow_type: String,
    pub assignment_type: AssignmentType,
    pub assignment_id: i64,
}

impl CreateWorkflowRequest {
    pub fn new(
        name: impl Into<String>,
        workflow_type: impl Into<String>,
        assignment_type: AssignmentType,
        assignment_id: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            id_number: None,
            workflow_type: workflow_type.into(),
            assignment_type,
            assignment_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id_number(mut self, id_number: impl Into<String>) -> Self {
        self.id_number = Some(id_number.into());
        self
    }
}

/// Request to make a user an approver of one approval level
#[derive(Debug, Clone)]
pub struct AddApproverRequest {
    pub workflow_id: WorkflowId,
    pub approval_level_id: ApprovalLevelId,
    pub user_id: UserId,
    /// Defaults to the workflow's default assignment
    pub assignment_id: Option<AssignmentId>,
}

impl AddApproverRequest {
    pub fn new(workflow_id: WorkflowId, approval_level_id: ApprovalLevelId, user_id: UserId) -> Self {
        Self {
            workflow_id,
            approval_level_id,
            user_id,
            assignment_id: None,
        }
    }

    pub fn with_assignment(mut self, assignment_id: AssignmentId) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }
}

/// One stage with its configured features
#[derive(Debug, Clone, Serialize)]
pub struct StageDetails {
    pub stage: WorkflowStage,
    pub approval_levels: Vec<ApprovalLevel>,
    pub formviews: Vec<Formview>,
    pub interactions: Vec<Interaction>,
}

/// A workflow with its versions, assignments and latest stage graph
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDetails {
    pub workflow: Workflow,
    pub versions: Vec<WorkflowVersion>,
    pub assignments: Vec<Assignment>,
    /// Active approvers of the workflow's assignments
    pub approvers: Vec<AssignmentApprover>,
    pub latest_version_id: WorkflowVersionId,
    pub stages: Vec<StageDetails>,
}

/// Stage being edited, with the draft version and workflow it belongs to
struct EditableStage {
    stage: WorkflowStage,
    workflow: Workflow,
}

/// Creates the shared category context every workflow context lives under
pub async fn create_category_context(store: &dyn ApprovalStore) -> Result<Context, DomainError> {
    let tx = store.begin().await?;
    let system = tx.contexts().insert(Context::root()).await?;
    let category = tx.contexts().insert(Context::child_of(&system)).await?;
    tx.commit().await?;
    Ok(category)
}

/// Workflow authoring service
pub struct WorkflowService {
    store: Arc<dyn ApprovalStore>,
    capabilities: Arc<dyn CapabilityChecker>,
    directory: Arc<dyn AssignmentDirectory>,
    events: Arc<dyn EventSink>,
    labels: UntitledLabels,
    category_context_id: ContextId,
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService")
            .field("category_context_id", &self.category_context_id)
            .finish()
    }
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        capabilities: Arc<dyn CapabilityChecker>,
        directory: Arc<dyn AssignmentDirectory>,
        events: Arc<dyn EventSink>,
        category_context_id: ContextId,
    ) -> Self {
        Self {
            store,
            capabilities,
            directory,
            events,
            labels: UntitledLabels::default(),
            category_context_id,
        }
    }

    pub fn with_untitled_labels(mut self, labels: UntitledLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn category_context_id(&self) -> ContextId {
        self.category_context_id
    }

    // Queries

    /// List all workflows
    pub async fn list(&self) -> Result<Vec<Workflow>, ApprovalError> {
        let tx = self.store.begin().await?;
        Ok(tx.workflows().list().await?)
    }

    /// Workflow with its versions, assignments and the latest version's stages
    pub async fn get(&self, workflow_id: WorkflowId) -> Result<WorkflowDetails, ApprovalError> {
        let tx = self.store.begin().await?;
        let workflow = tx.workflows().load(&workflow_id).await?;
        let versions = tx
            .versions()
            .find(&|v: &WorkflowVersion| v.workflow_id() == workflow_id)
            .await?;
        let assignments = tx
            .assignments()
            .find(&|a: &Assignment| a.workflow_id() == workflow_id)
            .await?;
        let approvers = active_approvers(tx.as_ref(), &assignments).await?;

        let latest = latest_version(tx.as_ref(), workflow_id).await?;
        let graph = VersionGraph::load(tx.as_ref(), latest.id()).await?;
        let stages = graph
            .stages()
            .iter()
            .map(|node| StageDetails {
                stage: node.stage().clone(),
                approval_levels: node.levels().to_vec(),
                formviews: node.formviews().to_vec(),
                interactions: node.interactions().to_vec(),
            })
            .collect();

        Ok(WorkflowDetails {
            workflow,
            versions,
            assignments,
            approvers,
            latest_version_id: latest.id(),
            stages,
        })
    }

    /// Active approvers of every assignment of a workflow
    pub async fn approvers(&self, workflow_id: WorkflowId) -> Result<Vec<AssignmentApprover>, ApprovalError> {
        let tx = self.store.begin().await?;
        tx.workflows().load(&workflow_id).await?;
        let assignments = tx
            .assignments()
            .find(&|a: &Assignment| a.workflow_id() == workflow_id)
            .await?;
        Ok(active_approvers(tx.as_ref(), &assignments).await?)
    }

    /// Latest version of a workflow
    pub async fn latest_version(&self, workflow_id: WorkflowId) -> Result<WorkflowVersion, ApprovalError> {
        let tx = self.store.begin().await?;
        Ok(latest_version(tx.as_ref(), workflow_id).await?)
    }

    // Workflow lifecycle

    /// Create a workflow with a draft version and an active default assignment
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateWorkflowRequest,
        actor: UserId,
    ) -> Result<Workflow, ApprovalError> {
        debug!("Creating workflow");
        ensure_capability(
            self.capabilities.as_ref(),
            actor,
            Capability::CreateWorkflow,
            &CapabilityScope::context(self.category_context_id),
        )
        .await?;

        let target = resolve_target(
            self.directory.as_ref(),
            &self.labels,
            request.assignment_type,
            request.assignment_id,
        )
        .await?;

        let tx = self.store.begin().await?;
        let created = create_workflow_shell(
            tx.as_ref(),
            WorkflowShell {
                name: &request.name,
                description: request.description.as_deref().unwrap_or_default(),
                id_number: request.id_number.as_deref(),
                workflow_type: &request.workflow_type,
                parent_context_id: self.category_context_id,
                target: &target,
            },
        )
        .await?;

        let mut assignment = created.assignment;
        assignment.activate();
        tx.assignments().update(assignment).await?;
        tx.commit().await?;

        let workflow = created.workflow;
        info!(workflow_id = %workflow.id(), id_number = %workflow.id_number(), "Created workflow");
        emit(
            self.events.as_ref(),
            EventType::WorkflowCreated,
            json!({
                "workflow_id": workflow.id(),
                "workflow_version_id": created.version.id(),
                "user_id": actor,
            }),
        )
        .await;

        Ok(workflow)
    }

    /// Publish a draft version: archive the active one, activate this one and
    /// the workflow's draft assignments
    #[instrument(skip(self))]
    pub async fn publish(
        &self,
        version_id: WorkflowVersionId,
        actor: UserId,
    ) -> Result<WorkflowVersion, ApprovalError> {
        let tx = self.store.begin().await?;
        let mut version = tx.versions().load(&version_id).await?;
        let workflow = tx.workflows().load(&version.workflow_id()).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ActivateWorkflow)
            .await?;

        let graph = VersionGraph::load(tx.as_ref(), version_id).await?;
        validate_publishable(&graph)?;

        let active = tx
            .versions()
            .find(&|v: &WorkflowVersion| {
                v.workflow_id() == workflow.id() && v.is_active() && v.id() != version_id
            })
            .await?;
        for mut previous in active {
            previous.archive();
            tx.versions().update(previous).await?;
        }

        version.activate()?;
        let version = tx.versions().update(version).await?;

        let drafts = tx
            .assignments()
            .find(&|a: &Assignment| {
                a.workflow_id() == workflow.id() && a.status() == AssignmentStatus::Draft
            })
            .await?;
        for mut assignment in drafts {
            assignment.activate();
            tx.assignments().update(assignment).await?;
        }
        tx.commit().await?;

        info!(workflow_id = %workflow.id(), version_id = %version_id, "Published workflow version");
        emit(
            self.events.as_ref(),
            EventType::WorkflowPublished,
            json!({"workflow_id": workflow.id(), "workflow_version_id": version_id, "user_id": actor}),
        )
        .await;
        Ok(version)
    }

    /// Archive every active version of a workflow
    #[instrument(skip(self))]
    pub async fn archive(&self, workflow_id: WorkflowId, actor: UserId) -> Result<(), ApprovalError> {
        let tx = self.store.begin().await?;
        let workflow = tx.workflows().load(&workflow_id).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ArchiveWorkflow)
            .await?;

        let active = tx
            .versions()
            .find(&|v: &WorkflowVersion| v.workflow_id() == workflow_id && v.is_active())
            .await?;
        if active.is_empty() {
            return Err(ApprovalError::action_not_allowed(
                "Cannot archive workflow because it is not active",
            ));
        }
        for mut version in active {
            version.archive();
            tx.versions().update(version).await?;
        }
        tx.commit().await?;

        info!(workflow_id = %workflow_id, "Archived workflow");
        emit(
            self.events.as_ref(),
            EventType::WorkflowArchived,
            json!({"workflow_id": workflow_id, "user_id": actor}),
        )
        .await;
        Ok(())
    }

    /// Put the most recently archived version back into service
    #[instrument(skip(self))]
    pub async fn unarchive(&self, workflow_id: WorkflowId, actor: UserId) -> Result<(), ApprovalError> {
        let tx = self.store.begin().await?;
        let workflow = tx.workflows().load(&workflow_id).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ArchiveWorkflow)
            .await?;

        if active_version(tx.as_ref(), workflow_id).await?.is_some() {
            return Err(ApprovalError::action_not_allowed(
                "Cannot unarchive workflow because it is already active",
            ));
        }
        let mut archived = tx
            .versions()
            .find(&|v: &WorkflowVersion| {
                v.workflow_id() == workflow_id
                    && v.status() == VersionStatus::Archived
            })
            .await?
            .into_iter()
            .max_by_key(|v| v.id())
            .ok_or_else(|| {
                ApprovalError::action_not_allowed("Cannot unarchive workflow because it is not archived")
            })?;
        archived.restore();
        let version_id = archived.id();
        tx.versions().update(archived).await?;
        tx.commit().await?;

        info!(workflow_id = %workflow_id, version_id = %version_id, "Unarchived workflow");
        emit(
            self.events.as_ref(),
            EventType::WorkflowUnarchived,
            json!({"workflow_id": workflow_id, "workflow_version_id": version_id, "user_id": actor}),
        )
        .await;
        Ok(())
    }

    /// Delete a workflow and everything it owns. Workflows with applications
    /// can not be deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, workflow_id: WorkflowId, actor: UserId) -> Result<(), ApprovalError> {
        let tx = self.store.begin().await?;
        let workflow = tx.workflows().load(&workflow_id).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ManageWorkflows)
            .await?;

        let versions = tx
            .versions()
            .find(&|v: &WorkflowVersion| v.workflow_id() == workflow_id)
            .await?;
        let version_ids: HashSet<WorkflowVersionId> = versions.iter().map(|v| v.id()).collect();

        let applications = tx
            .applications()
            .find(&|a: &Application| version_ids.contains(&a.workflow_version_id()))
            .await?;
        if !applications.is_empty() {
            return Err(ApprovalError::action_not_allowed(format!(
                "Workflow {} has {} application(s) and can not be deleted",
                workflow_id,
                applications.len()
            )));
        }

        for version in &versions {
            let stages = tx
                .stages()
                .find(&|s: &WorkflowStage| s.workflow_version_id() == version.id())
                .await?;
            for stage in stages {
                delete_stage_records(tx.as_ref(), workflow.context_id(), stage.id()).await?;
                tx.stages().delete(&stage.id()).await?;
            }
            tx.versions().delete(&version.id()).await?;
        }

        let assignments = tx
            .assignments()
            .find(&|a: &Assignment| a.workflow_id() == workflow_id)
            .await?;
        for assignment in assignments {
            for approver in tx
                .approvers()
                .find(&|a: &AssignmentApprover| a.assignment_id() == assignment.id())
                .await?
            {
                tx.approvers().delete(&approver.id()).await?;
            }
            tx.assignments().delete(&assignment.id()).await?;
        }

        tx.workflows().delete(&workflow_id).await?;
        tx.contexts().delete(&workflow.context_id()).await?;
        tx.commit().await?;

        info!(workflow_id = %workflow_id, "Deleted workflow");
        emit(
            self.events.as_ref(),
            EventType::WorkflowDeleted,
            json!({"workflow_id": workflow_id, "user_id": actor}),
        )
        .await;
        Ok(())
    }

    // Stages

    /// Add a stage to a draft version. A finished stage goes last; any other
    /// stage goes before the finished stage.
    #[instrument(skip(self, name))]
    pub async fn add_stage(
        &self,
        version_id: WorkflowVersionId,
        name: &str,
        stage_type: StageType,
        actor: UserId,
    ) -> Result<WorkflowStage, ApprovalError> {
        let tx = self.store.begin().await?;
        let version = tx.versions().load(&version_id).await?;
        ensure_draft(&version)?;
        let workflow = tx.workflows().load(&version.workflow_id()).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ManageWorkflowStages)
            .await?;

        let stages = tx
            .stages()
            .find(&|s: &WorkflowStage| s.workflow_version_id() == version_id)
            .await?;

        let sort_order = if stage_type == StageType::Finished {
            if stages.iter().any(|s| s.stage_type() == StageType::Finished) {
                return Err(DomainError::validation(
                    "A workflow version can only have one finished stage",
                )
                .into());
            }
            stages.iter().map(|s| s.sort_order()).max().unwrap_or(0) + 1
        } else {
            stages
                .iter()
                .filter(|s| s.stage_type() != StageType::Finished)
                .map(|s| s.sort_order())
                .max()
                .unwrap_or(0)
                + 1
        };

        for mut following in stages.into_iter().filter(|s| s.sort_order() >= sort_order) {
            following.set_sort_order(following.sort_order() + 1);
            tx.stages().update(following).await?;
        }

        let stage = tx
            .stages()
            .insert(WorkflowStage::new(version_id, name, stage_type, sort_order)?)
            .await?;
        seed_stage_features(tx.as_ref(), &stage).await?;
        tx.commit().await?;

        info!(
            stage_id = %stage.id(),
            stage_type = %stage_type,
            sort_order = sort_order,
            "Added workflow stage"
        );
        Ok(stage)
    }

    /// Delete a stage of a draft version with its features and close the
    /// sort order gap
    #[instrument(skip(self))]
    pub async fn delete_stage(&self, stage_id: StageId, actor: UserId) -> Result<(), ApprovalError> {
        let tx = self.store.begin().await?;
        let editable = self
            .editable_stage(tx.as_ref(), stage_id, actor, Capability::ManageWorkflowStages)
            .await?;
        let version_id = editable.stage.workflow_version_id();

        delete_stage_records(tx.as_ref(), editable.workflow.context_id(), stage_id).await?;
        tx.stages().delete(&stage_id).await?;

        let siblings = tx
            .stages()
            .find(&|s: &WorkflowStage| s.workflow_version_id() == version_id)
            .await?;
        let sibling_ids: HashSet<StageId> = siblings.iter().map(|s| s.id()).collect();
        for mut following in siblings
            .into_iter()
            .filter(|s| s.sort_order() > editable.stage.sort_order())
        {
            following.set_sort_order(following.sort_order() - 1);
            tx.stages().update(following).await?;
        }

        let dangling = tx
            .interactions()
            .find(&|i: &Interaction| {
                sibling_ids.contains(&i.workflow_stage_id())
                    && i.transition() == InteractionTransition::ToStage(stage_id)
            })
            .await?;
        for interaction in dangling {
            tx.interactions().delete(&interaction.id()).await?;
        }
        tx.commit().await?;

        info!(stage_id = %stage_id, "Deleted workflow stage");
        Ok(())
    }

    // Approval levels

    #[instrument(skip(self, name))]
    pub async fn add_approval_level(
        &self,
        stage_id: StageId,
        name: &str,
        actor: UserId,
    ) -> Result<ApprovalLevel, ApprovalError> {
        let tx = self.store.begin().await?;
        let editable = self
            .editable_stage(tx.as_ref(), stage_id, actor, Capability::EditDraftWorkflow)
            .await?;
        ensure_feature(&editable.stage, StageFeature::ApprovalLevels)?;

        let levels = stage_levels(tx.as_ref(), stage_id).await?;
        let sort_order = levels.iter().map(|l| l.sort_order()).max().unwrap_or(0) + 1;
        let name = match name.trim() {
            "" => format!("Level {}", sort_order),
            name => name.to_string(),
        };

        let level = tx
            .approval_levels()
            .insert(ApprovalLevel::new(stage_id, name, sort_order))
            .await?;
        tx.commit().await?;

        info!(stage_id = %stage_id, level_id = %level.id(), "Added approval level");
        Ok(level)
    }

    /// Delete an approval level; an approvals stage keeps at least one
    #[instrument(skip(self))]
    pub async fn delete_approval_level(
        &self,
        level_id: ApprovalLevelId,
        actor: UserId,
    ) -> Result<(), ApprovalError> {
        let tx = self.store.begin().await?;
        let level = tx.approval_levels().load(&level_id).await?;
        let stage_id = level.workflow_stage_id();
        self.editable_stage(tx.as_ref(), stage_id, actor, Capability::EditDraftWorkflow)
            .await?;

        let levels = stage_levels(tx.as_ref(), stage_id).await?;
        if levels.len() <= 1 {
            return Err(DomainError::validation(
                "An approvals stage must have at least one approval level",
            )
            .into());
        }

        delete_level_approvers(tx.as_ref(), level_id).await?;
        tx.approval_levels().delete(&level_id).await?;
        for mut following in levels
            .into_iter()
            .filter(|l| l.sort_order() > level.sort_order())
        {
            following.set_sort_order(following.sort_order() - 1);
            tx.approval_levels().update(following).await?;
        }
        tx.commit().await?;

        info!(stage_id = %stage_id, level_id = %level_id, "Deleted approval level");
        Ok(())
    }

    /// Put the levels of a stage in the given order. Every level of the
    /// stage must be listed exactly once.
    #[instrument(skip(self, order))]
    pub async fn reorder_approval_levels(
        &self,
        stage_id: StageId,
        order: &[ApprovalLevelId],
        actor: UserId,
    ) -> Result<Vec<ApprovalLevel>, ApprovalError> {
        let tx = self.store.begin().await?;
        self.editable_stage(tx.as_ref(), stage_id, actor, Capability::EditDraftWorkflow)
            .await?;

        let levels = stage_levels(tx.as_ref(), stage_id).await?;
        let current: HashSet<ApprovalLevelId> = levels.iter().map(|l| l.id()).collect();
        let requested: HashSet<ApprovalLevelId> = order.iter().copied().collect();
        if requested.len() != order.len() || requested != current {
            return Err(DomainError::validation(format!(
                "Level order must list each of the {} levels of stage {} exactly once",
                current.len(),
                stage_id
            ))
            .into());
        }

        let mut reordered = Vec::with_capacity(levels.len());
        for (index, level_id) in order.iter().enumerate() {
            let mut level = tx.approval_levels().load(level_id).await?;
            level.set_sort_order(index as i32 + 1);
            reordered.push(tx.approval_levels().update(level).await?);
        }
        tx.commit().await?;

        debug!(stage_id = %stage_id, "Reordered approval levels");
        Ok(reordered)
    }

    // Approvers

    /// Let a user approve one level of a workflow for one of its assignments.
    /// A removed approver is reactivated rather than duplicated.
    #[instrument(skip(self, request), fields(level_id = %request.approval_level_id, user_id = %request.user_id))]
    pub async fn add_approver(
        &self,
        request: AddApproverRequest,
        actor: UserId,
    ) -> Result<AssignmentApprover, ApprovalError> {
        let tx = self.store.begin().await?;
        let workflow = tx.workflows().load(&request.workflow_id).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ManageIndividualWorkflowApprovers)
            .await?;

        let level = tx.approval_levels().load(&request.approval_level_id).await?;
        let stage = tx.stages().load(&level.workflow_stage_id()).await?;
        let level_workflow = self.stage_workflow(tx.as_ref(), &stage).await?;
        if !level.is_active() || level_workflow.id() != workflow.id() {
            return Err(DomainError::validation(format!(
                "Approval level {} is not an active level of workflow {}",
                level.id(),
                workflow.id()
            ))
            .into());
        }

        let assignment = workflow_assignment(tx.as_ref(), workflow.id(), request.assignment_id).await?;
        let existing = tx
            .approvers()
            .find(&|a: &AssignmentApprover| a.matches(assignment.id(), level.id(), request.user_id))
            .await?;

        let approver = match existing.into_iter().next() {
            Some(approver) if approver.is_active() => {
                return Err(DomainError::validation(format!(
                    "User {} is already an approver of approval level {} for assignment {}",
                    request.user_id,
                    level.id(),
                    assignment.id()
                ))
                .into());
            }
            Some(mut approver) => {
                approver.activate();
                tx.approvers().update(approver).await?
            }
            None => {
                tx.approvers()
                    .insert(AssignmentApprover::new(assignment.id(), level.id(), request.user_id))
                    .await?
            }
        };
        tx.commit().await?;

        info!(
            approver_id = %approver.id(),
            assignment_id = %assignment.id(),
            "Added approver"
        );
        Ok(approver)
    }

    /// Deactivate an approver
    #[instrument(skip(self))]
    pub async fn remove_approver(
        &self,
        approver_id: AssignmentApproverId,
        actor: UserId,
    ) -> Result<AssignmentApprover, ApprovalError> {
        let tx = self.store.begin().await?;
        let mut approver = tx.approvers().load(&approver_id).await?;
        let assignment = tx.assignments().load(&approver.assignment_id()).await?;
        let workflow = tx.workflows().load(&assignment.workflow_id()).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::ManageIndividualWorkflowApprovers)
            .await?;

        if !approver.is_active() {
            return Err(DomainError::validation(format!(
                "Approver {} has already been removed",
                approver_id
            ))
            .into());
        }
        approver.deactivate();
        let approver = tx.approvers().update(approver).await?;
        tx.commit().await?;

        info!(approver_id = %approver_id, "Removed approver");
        Ok(approver)
    }

    // Formviews and interactions

    /// Configure how a form field shows at a stage, replacing any earlier
    /// configuration of the field
    #[instrument(skip(self, default_value))]
    pub async fn add_formview(
        &self,
        stage_id: StageId,
        field_key: &str,
        visibility: FormviewVisibility,
        default_value: Option<String>,
        actor: UserId,
    ) -> Result<Formview, ApprovalError> {
        let tx = self.store.begin().await?;
        let editable = self
            .editable_stage(tx.as_ref(), stage_id, actor, Capability::EditDraftWorkflow)
            .await?;
        ensure_feature(&editable.stage, StageFeature::Formviews)?;

        let field_key = field_key.trim();
        if field_key.is_empty() {
            return Err(DomainError::validation("Formview field key cannot be empty").into());
        }

        let existing = tx
            .formviews()
            .find(&|f: &Formview| f.workflow_stage_id() == stage_id && f.field_key() == field_key)
            .await?;
        for formview in existing {
            tx.formviews().delete(&formview.id()).await?;
        }

        let mut formview = Formview::new(stage_id, field_key, visibility);
        if let Some(value) = default_value {
            formview = formview.with_default_value(value);
        }
        let formview = tx.formviews().insert(formview).await?;
        tx.commit().await?;

        debug!(stage_id = %stage_id, field_key = %field_key, "Configured formview");
        Ok(formview)
    }

    /// Bind an action of a stage to a transition, replacing any earlier
    /// binding of the action
    #[instrument(skip(self))]
    pub async fn add_interaction(
        &self,
        stage_id: StageId,
        action: ActionType,
        transition: InteractionTransition,
        actor: UserId,
    ) -> Result<Interaction, ApprovalError> {
        let tx = self.store.begin().await?;
        let editable = self
            .editable_stage(tx.as_ref(), stage_id, actor, Capability::EditDraftWorkflow)
            .await?;
        ensure_feature(&editable.stage, StageFeature::Interactions)?;

        let stage_type = editable.stage.stage_type();
        if !stage_type.allows(action) {
            return Err(ApprovalError::action_not_allowed(format!(
                "{} is not available in a {} stage",
                action, stage_type
            )));
        }

        if let InteractionTransition::ToStage(target) = transition {
            let target_stage = tx.stages().get(&target).await?;
            if target_stage.map(|s| s.workflow_version_id())
                != Some(editable.stage.workflow_version_id())
            {
                return Err(DomainError::validation(format!(
                    "Interaction target stage {} is not part of this workflow version",
                    target
                ))
                .into());
            }
        }

        let existing = tx
            .interactions()
            .find(&|i: &Interaction| i.workflow_stage_id() == stage_id && i.action() == action)
            .await?;
        for interaction in existing {
            tx.interactions().delete(&interaction.id()).await?;
        }

        let interaction = tx
            .interactions()
            .insert(Interaction::new(stage_id, action, transition))
            .await?;
        tx.commit().await?;

        debug!(stage_id = %stage_id, action = %action, "Set stage interaction");
        Ok(interaction)
    }

    // Stage notifications

    /// Store a notification preference at a stage's extended context
    #[instrument(skip(self, template))]
    pub async fn add_stage_notification(
        &self,
        stage_id: StageId,
        template: &NotificationPreference,
        actor: UserId,
    ) -> Result<NotificationPreference, ApprovalError> {
        let tx = self.store.begin().await?;
        let stage = tx.stages().load(&stage_id).await?;
        let workflow = self.stage_workflow(tx.as_ref(), &stage).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::EditDraftWorkflow)
            .await?;

        let preference = tx
            .notification_preferences()
            .insert(template.placed_at(ExtendedContext::for_stage(workflow.context_id(), stage_id)))
            .await?;
        tx.commit().await?;

        debug!(stage_id = %stage_id, preference_id = %preference.id(), "Added stage notification");
        Ok(preference)
    }

    /// Enable or disable an event resolver at a stage. `channels` of `None`
    /// keeps the resolver's own defaults.
    #[instrument(skip(self, channels))]
    pub async fn set_stage_event_preference(
        &self,
        stage_id: StageId,
        resolver_class_name: &str,
        enabled: bool,
        channels: Option<Vec<String>>,
        actor: UserId,
    ) -> Result<NotifiableEventPreference, ApprovalError> {
        let tx = self.store.begin().await?;
        let stage = tx.stages().load(&stage_id).await?;
        let workflow = self.stage_workflow(tx.as_ref(), &stage).await?;
        self.ensure_workflow_capability(&workflow, actor, Capability::EditDraftWorkflow)
            .await?;

        let extended_context = ExtendedContext::for_stage(workflow.context_id(), stage_id);
        let existing = tx
            .event_preferences()
            .find(&|p: &NotifiableEventPreference| {
                p.extended_context() == &extended_context
                    && p.resolver_class_name() == resolver_class_name
            })
            .await?;
        for preference in existing {
            tx.event_preferences().delete(&preference.id()).await?;
        }

        let preference = tx
            .event_preferences()
            .insert(
                NotifiableEventPreference::new(extended_context, resolver_class_name, enabled)
                    .with_default_delivery_channels(channels),
            )
            .await?;
        tx.commit().await?;

        debug!(stage_id = %stage_id, resolver = %resolver_class_name, "Set stage event preference");
        Ok(preference)
    }

    // Helpers

    async fn ensure_workflow_capability(
        &self,
        workflow: &Workflow,
        actor: UserId,
        capability: Capability,
    ) -> Result<(), ApprovalError> {
        ensure_capability(
            self.capabilities.as_ref(),
            actor,
            capability,
            &CapabilityScope::context(workflow.context_id()),
        )
        .await
    }

    async fn stage_workflow(
        &self,
        tx: &dyn StoreTransaction,
        stage: &WorkflowStage,
    ) -> Result<Workflow, ApprovalError> {
        let version = tx.versions().load(&stage.workflow_version_id()).await?;
        Ok(tx.workflows().load(&version.workflow_id()).await?)
    }

    /// Loads a stage of a draft version after checking the capability
    async fn editable_stage(
        &self,
        tx: &dyn StoreTransaction,
        stage_id: StageId,
        actor: UserId,
        capability: Capability,
    ) -> Result<EditableStage, ApprovalError> {
        let stage = tx.stages().load(&stage_id).await?;
        let version = tx.versions().load(&stage.workflow_version_id()).await?;
        ensure_draft(&version)?;
        let workflow = tx.workflows().load(&version.workflow_id()).await?;
        self.ensure_workflow_capability(&workflow, actor, capability)
            .await?;
        Ok(EditableStage { stage, workflow })
    }
}

fn ensure_draft(version: &WorkflowVersion) -> Result<(), ApprovalError> {
    if !version.is_draft() {
        return Err(ApprovalError::action_not_allowed(format!(
            "Workflow version {} is {} and can no longer be edited",
            version.id(),
            version.status()
        )));
    }
    Ok(())
}

fn ensure_feature(stage: &WorkflowStage, feature: StageFeature) -> Result<(), ApprovalError> {
    if !stage.stage_type().has_feature(feature) {
        return Err(ApprovalError::action_not_allowed(format!(
            "A {} stage does not support {:?}",
            stage.stage_type(),
            feature
        )));
    }
    Ok(())
}

/// The requested assignment of a workflow, or its default one
async fn workflow_assignment(
    tx: &dyn StoreTransaction,
    workflow_id: WorkflowId,
    assignment_id: Option<AssignmentId>,
) -> Result<Assignment, ApprovalError> {
    let assignments = tx
        .assignments()
        .find(&|a: &Assignment| a.workflow_id() == workflow_id)
        .await?;
    let found = match assignment_id {
        Some(id) => assignments.into_iter().find(|a| a.id() == id),
        None => assignments.into_iter().find(|a| a.is_default()),
    };
    found.ok_or_else(|| {
        DomainError::validation(match assignment_id {
            Some(id) => format!("Assignment {} does not belong to workflow {}", id, workflow_id),
            None => format!("Workflow {} has no default assignment", workflow_id),
        })
        .into()
    })
}

async fn active_approvers(
    tx: &dyn StoreTransaction,
    assignments: &[Assignment],
) -> Result<Vec<AssignmentApprover>, DomainError> {
    let assignment_ids: HashSet<AssignmentId> = assignments.iter().map(|a| a.id()).collect();
    let mut approvers = tx
        .approvers()
        .find(&|a: &AssignmentApprover| a.is_active() && assignment_ids.contains(&a.assignment_id()))
        .await?;
    approvers.sort_by_key(|a| a.id());
    Ok(approvers)
}

async fn delete_level_approvers(
    tx: &dyn StoreTransaction,
    level_id: ApprovalLevelId,
) -> Result<(), DomainError> {
    for approver in tx
        .approvers()
        .find(&|a: &AssignmentApprover| a.approval_level_id() == level_id)
        .await?
    {
        tx.approvers().delete(&approver.id()).await?;
    }
    Ok(())
}

async fn stage_levels(
    tx: &dyn StoreTransaction,
    stage_id: StageId,
) -> Result<Vec<ApprovalLevel>, DomainError> {
    let mut levels = tx
        .approval_levels()
        .find(&|l: &ApprovalLevel| l.workflow_stage_id() == stage_id)
        .await?;
    levels.sort_by_key(|l| l.sort_order());
    Ok(levels)
}

/// Default features of a new stage
async fn seed_stage_features(
    tx: &dyn StoreTransaction,
    stage: &WorkflowStage,
) -> Result<(), DomainError> {
    match stage.stage_type() {
        StageType::FormSubmission => {
            tx.interactions()
                .insert(Interaction::new(stage.id(), ActionType::Submit, InteractionTransition::Next))
                .await?;
        }
        StageType::Approvals => {
            tx.approval_levels()
                .insert(ApprovalLevel::new(stage.id(), DEFAULT_LEVEL_NAME, 1))
                .await?;
            tx.interactions()
                .insert(Interaction::new(stage.id(), ActionType::Approve, InteractionTransition::Next))
                .await?;
            tx.interactions()
                .insert(Interaction::new(stage.id(), ActionType::Reject, InteractionTransition::Stay))
                .await?;
        }
        StageType::Waiting | StageType::Finished => {}
    }
    Ok(())
}

/// Removes the features and stage-scoped preferences of a stage
async fn delete_stage_records(
    tx: &dyn StoreTransaction,
    context_id: ContextId,
    stage_id: StageId,
) -> Result<(), DomainError> {
    for level in tx
        .approval_levels()
        .find(&|l: &ApprovalLevel| l.workflow_stage_id() == stage_id)
        .await?
    {
        delete_level_approvers(tx, level.id()).await?;
        tx.approval_levels().delete(&level.id()).await?;
    }
    for formview in tx
        .formviews()
        .find(&|f: &Formview| f.workflow_stage_id() == stage_id)
        .await?
    {
        tx.formviews().delete(&formview.id()).await?;
    }
    for interaction in tx
        .interactions()
        .find(&|i: &Interaction| i.workflow_stage_id() == stage_id)
        .await?
    {
        tx.interactions().delete(&interaction.id()).await?;
    }

    let extended_context = ExtendedContext::for_stage(context_id, stage_id);
    for preference in tx
        .notification_preferences()
        .find(&|p: &NotificationPreference| p.extended_context() == &extended_context)
        .await?
    {
        tx.notification_preferences().delete(&preference.id()).await?;
    }
    for preference in tx
        .event_preferences()
        .find(&|p: &NotifiableEventPreference| p.extended_context() == &extended_context)
        .await?
    {
        tx.event_preferences().delete(&preference.id()).await?;
    }
    Ok(())
}

/// A version can go live when it starts with a form submission stage, ends
/// with its only finished stage and every approvals stage has a level
fn validate_publishable(graph: &VersionGraph) -> Result<(), ApprovalError> {
    let mut problems = Vec::new();
    let stages = graph.stages();

    match stages.first() {
        None => problems.push("it has no stages".to_string()),
        Some(first) if first.stage_type() != StageType::FormSubmission => {
            problems.push(format!("first stage '{}' is not a form submission stage", first.stage().name()))
        }
        Some(_) => {}
    }

    let finished = stages
        .iter()
        .filter(|n| n.stage_type() == StageType::Finished)
        .count();
    if finished != 1 {
        problems.push(format!("it has {} finished stages instead of one", finished));
    } else if stages.last().map(|n| n.stage_type()) != Some(StageType::Finished) {
        problems.push("the finished stage is not the last stage".to_string());
    }

    for node in stages {
        if node.stage_type() == StageType::Approvals && node.levels().is_empty() {
            problems.push(format!("approvals stage '{}' has no approval level", node.stage().name()));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "Workflow version {} can not be published: {}",
            graph.version_id(),
            problems.join("; ")
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::services::test_support::{harness, Harness, ADMIN, APPLICANT, MANAGER};

    async fn draft_workflow(h: &Harness) -> (Workflow, WorkflowVersionId) {
        let workflow = h
            .workflows
            .create(
                CreateWorkflowRequest::new("Leave", "leave", AssignmentType::Organisation, 1),
                ADMIN,
            )
            .await
            .unwrap();
        let version = h.workflows.latest_version(workflow.id()).await.unwrap();
        (workflow, version.id())
    }

    #[tokio::test]
    async fn test_create_workflow() {
        let h = harness().await;
        let (workflow, version_id) = draft_workflow(&h).await;

        assert_eq!(workflow.name(), "Leave");
        assert!(workflow.id_number().starts_with("workflow"));

        let details = h.workflows.get(workflow.id()).await.unwrap();
        assert_eq!(details.latest_version_id, version_id);
        assert_eq!(details.versions[0].status(), VersionStatus::Draft);
        assert_eq!(details.assignments.len(), 1);
        assert!(details.assignments[0].is_default());
        assert!(details.assignments[0].is_active());
        assert_eq!(details.assignments[0].id_number(), "ORGANISATION_1");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id_number() {
        let h = harness().await;
        let request = CreateWorkflowRequest::new("Leave", "leave", AssignmentType::Organisation, 1)
            .with_id_number("LEAVE");
        h.workflows.create(request.clone(), ADMIN).await.unwrap();

        let result = h.workflows.create(request, ADMIN).await;
        assert!(matches!(
            result,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_requires_capability() {
        let h = harness().await;
        let result = h
            .workflows
            .create(
                CreateWorkflowRequest::new("Leave", "leave", AssignmentType::Organisation, 1),
                UserId::new(999),
            )
            .await;
        assert!(matches!(result, Err(ApprovalError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_add_stage_keeps_finished_last() {
        let h = harness().await;
        let (workflow, version_id) = draft_workflow(&h).await;

        h.workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        h.workflows
            .add_stage(version_id, "Done", StageType::Finished, ADMIN)
            .await
            .unwrap();
        h.workflows
            .add_stage(version_id, "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();

        let details = h.workflows.get(workflow.id()).await.unwrap();
        let shape: Vec<(&str, i32)> = details
            .stages
            .iter()
            .map(|s| (s.stage.name(), s.stage.sort_order()))
            .collect();
        assert_eq!(shape, vec![("Request", 1), ("Manager", 2), ("Done", 3)]);

        // Default features
        assert_eq!(details.stages[0].interactions[0].action(), ActionType::Submit);
        assert_eq!(details.stages[1].approval_levels.len(), 1);
        assert_eq!(details.stages[1].approval_levels[0].name(), DEFAULT_LEVEL_NAME);
        assert!(details.stages[2].interactions.is_empty());

        let second_finished = h
            .workflows
            .add_stage(version_id, "Done again", StageType::Finished, ADMIN)
            .await;
        assert!(matches!(
            second_finished,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_stage_closes_gap() {
        let h = harness().await;
        let (workflow, version_id) = draft_workflow(&h).await;
        h.workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        let manager = h
            .workflows
            .add_stage(version_id, "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();
        h.workflows
            .add_stage(version_id, "Done", StageType::Finished, ADMIN)
            .await
            .unwrap();

        h.workflows.delete_stage(manager.id(), ADMIN).await.unwrap();

        let details = h.workflows.get(workflow.id()).await.unwrap();
        let orders: Vec<i32> = details.stages.iter().map(|s| s.stage.sort_order()).collect();
        assert_eq!(orders, vec![1, 2]);

        let tx = h.store.begin().await.unwrap();
        let levels = tx
            .approval_levels()
            .find(&|l: &ApprovalLevel| l.workflow_stage_id() == manager.id())
            .await
            .unwrap();
        assert!(levels.is_empty());
    }

    #[tokio::test]
    async fn test_approval_levels() {
        let h = harness().await;
        let (_, version_id) = draft_workflow(&h).await;
        let stage = h
            .workflows
            .add_stage(version_id, "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();

        let second = h
            .workflows
            .add_approval_level(stage.id(), "", ADMIN)
            .await
            .unwrap();
        assert_eq!(second.name(), "Level 2");
        assert_eq!(second.sort_order(), 2);

        let tx = h.store.begin().await.unwrap();
        let first = stage_levels(tx.as_ref(), stage.id()).await.unwrap()[0].clone();
        drop(tx);

        let reordered = h
            .workflows
            .reorder_approval_levels(stage.id(), &[second.id(), first.id()], ADMIN)
            .await
            .unwrap();
        assert_eq!(reordered[0].id(), second.id());
        assert_eq!(reordered[0].sort_order(), 1);

        let incomplete = h
            .workflows
            .reorder_approval_levels(stage.id(), &[second.id()], ADMIN)
            .await;
        assert!(incomplete.is_err());

        h.workflows
            .delete_approval_level(second.id(), ADMIN)
            .await
            .unwrap();
        let last = h.workflows.delete_approval_level(first.id(), ADMIN).await;
        assert!(matches!(
            last,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));
    }

    #[tokio::test]
    async fn test_levels_only_on_approvals_stages() {
        let h = harness().await;
        let (_, version_id) = draft_workflow(&h).await;
        let stage = h
            .workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();

        let result = h.workflows.add_approval_level(stage.id(), "Extra", ADMIN).await;
        assert!(matches!(result, Err(ApprovalError::ActionNotAllowed(_))));
    }

    #[tokio::test]
    async fn test_formview_replaces_field() {
        let h = harness().await;
        let (workflow, version_id) = draft_workflow(&h).await;
        let stage = h
            .workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();

        h.workflows
            .add_formview(stage.id(), "reason", FormviewVisibility::Editable, None, ADMIN)
            .await
            .unwrap();
        h.workflows
            .add_formview(
                stage.id(),
                "reason",
                FormviewVisibility::EditableAndRequired,
                Some("Holiday".to_string()),
                ADMIN,
            )
            .await
            .unwrap();

        let details = h.workflows.get(workflow.id()).await.unwrap();
        let formviews = &details.stages[0].formviews;
        assert_eq!(formviews.len(), 1);
        assert!(formviews[0].is_required());
        assert_eq!(formviews[0].default_value(), Some("Holiday"));
    }

    #[tokio::test]
    async fn test_interaction_validation() {
        let h = harness().await;
        let (_, version_id) = draft_workflow(&h).await;
        let request = h
            .workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        let manager = h
            .workflows
            .add_stage(version_id, "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();

        let not_available = h
            .workflows
            .add_interaction(request.id(), ActionType::Approve, InteractionTransition::Next, ADMIN)
            .await;
        assert!(matches!(not_available, Err(ApprovalError::ActionNotAllowed(_))));

        let foreign = h
            .workflows
            .add_interaction(
                manager.id(),
                ActionType::Approve,
                InteractionTransition::ToStage(StageId::new(9999)),
                ADMIN,
            )
            .await;
        assert!(foreign.is_err());

        let interaction = h
            .workflows
            .add_interaction(
                manager.id(),
                ActionType::Approve,
                InteractionTransition::ToStage(request.id()),
                ADMIN,
            )
            .await
            .unwrap();
        assert_eq!(interaction.transition(), InteractionTransition::ToStage(request.id()));
    }

    #[tokio::test]
    async fn test_publish_validates_and_archives_previous() {
        let h = harness().await;
        let (workflow, version_id) = draft_workflow(&h).await;
        h.workflows
            .add_stage(version_id, "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();

        let invalid = h.workflows.publish(version_id, ADMIN).await;
        assert!(matches!(
            invalid,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));

        h.workflows
            .add_stage(version_id, "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        h.workflows
            .add_stage(version_id, "Done", StageType::Finished, ADMIN)
            .await
            .unwrap();

        // Form submission was inserted after the approvals stage
        assert!(h.workflows.publish(version_id, ADMIN).await.is_err());

        let details = h.workflows.get(workflow.id()).await.unwrap();
        let manager = details.stages[0].stage.id();
        h.workflows.delete_stage(manager, ADMIN).await.unwrap();
        h.workflows
            .add_stage(version_id, "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();

        let version = h.workflows.publish(version_id, ADMIN).await.unwrap();
        assert!(version.is_active());

        // Published versions are frozen
        let frozen = h
            .workflows
            .add_stage(version_id, "Late", StageType::Waiting, ADMIN)
            .await;
        assert!(matches!(frozen, Err(ApprovalError::ActionNotAllowed(_))));
    }

    #[tokio::test]
    async fn test_archive_and_unarchive() {
        let h = harness().await;
        let workflow = h.published_workflow(&[(StageType::Approvals, 1)]).await;

        h.workflows.archive(workflow.id(), ADMIN).await.unwrap();
        let details = h.workflows.get(workflow.id()).await.unwrap();
        assert_eq!(details.versions[0].status(), VersionStatus::Archived);

        let again = h.workflows.archive(workflow.id(), ADMIN).await;
        assert!(matches!(again, Err(ApprovalError::ActionNotAllowed(_))));

        h.workflows.unarchive(workflow.id(), ADMIN).await.unwrap();
        let details = h.workflows.get(workflow.id()).await.unwrap();
        assert!(details.versions[0].is_active());
    }

    #[tokio::test]
    async fn test_delete_workflow_cascades() {
        let h = harness().await;
        let workflow = h.published_workflow(&[(StageType::Approvals, 2)]).await;

        h.workflows.delete(workflow.id(), ADMIN).await.unwrap();

        let tx = h.store.begin().await.unwrap();
        assert!(tx.workflows().list().await.unwrap().is_empty());
        assert!(tx.versions().list().await.unwrap().is_empty());
        assert!(tx.stages().list().await.unwrap().is_empty());
        assert!(tx.approval_levels().list().await.unwrap().is_empty());
        assert!(tx.interactions().list().await.unwrap().is_empty());
        assert!(tx.assignments().list().await.unwrap().is_empty());
        assert!(tx.approvers().list().await.unwrap().is_empty());
        assert!(!tx.contexts().exists(&workflow.context_id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_and_remove_approver() {
        let h = harness().await;
        let workflow = h.published_workflow(&[(StageType::Approvals, 2)]).await;
        let details = h.workflows.get(workflow.id()).await.unwrap();
        let level_id = details.stages[1].approval_levels[0].id();
        assert_eq!(details.approvers.len(), 2);
        assert!(details.approvers.iter().all(|a| a.user_id() == MANAGER));
        assert!(details.approvers.iter().all(|a| a.assignment_id() == details.assignments[0].id()));

        let duplicate = h
            .workflows
            .add_approver(AddApproverRequest::new(workflow.id(), level_id, MANAGER), ADMIN)
            .await;
        assert!(matches!(
            duplicate,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));

        let removed_id = details.approvers[0].id();
        let removed = h.workflows.remove_approver(removed_id, ADMIN).await.unwrap();
        assert!(!removed.is_active());
        assert_eq!(h.workflows.approvers(workflow.id()).await.unwrap().len(), 1);

        let again = h.workflows.remove_approver(removed_id, ADMIN).await;
        assert!(matches!(
            again,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));

        let restored = h
            .workflows
            .add_approver(
                AddApproverRequest::new(workflow.id(), removed.approval_level_id(), MANAGER),
                ADMIN,
            )
            .await
            .unwrap();
        assert_eq!(restored.id(), removed_id);
        assert!(restored.is_active());
        assert_eq!(h.workflows.approvers(workflow.id()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_approver_checks_workflow() {
        let h = harness().await;
        let first = h.published_workflow(&[(StageType::Approvals, 1)]).await;
        let second = h.published_workflow(&[(StageType::Approvals, 1)]).await;
        let foreign = h.workflows.get(second.id()).await.unwrap();
        let foreign_level = foreign.stages[1].approval_levels[0].id();

        let result = h
            .workflows
            .add_approver(AddApproverRequest::new(first.id(), foreign_level, UserId::new(21)), ADMIN)
            .await;
        assert!(matches!(
            result,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));

        let own = h.workflows.get(first.id()).await.unwrap();
        let result = h
            .workflows
            .add_approver(
                AddApproverRequest::new(first.id(), own.stages[1].approval_levels[0].id(), UserId::new(21))
                    .with_assignment(foreign.assignments[0].id()),
                ADMIN,
            )
            .await;
        assert!(matches!(
            result,
            Err(ApprovalError::Domain(DomainError::Validation { .. }))
        ));

        let denied = h
            .workflows
            .add_approver(
                AddApproverRequest::new(first.id(), own.stages[1].approval_levels[0].id(), UserId::new(21)),
                APPLICANT,
            )
            .await;
        assert!(matches!(denied, Err(ApprovalError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_delete_approval_level_removes_approvers() {
        let h = harness().await;
        let (workflow, version_id) = draft_workflow(&h).await;
        let stage = h
            .workflows
            .add_stage(version_id, "Review", StageType::Approvals, ADMIN)
            .await
            .unwrap();
        let second = h.workflows.add_approval_level(stage.id(), "", ADMIN).await.unwrap();
        h.workflows
            .add_approver(AddApproverRequest::new(workflow.id(), second.id(), MANAGER), ADMIN)
            .await
            .unwrap();
        assert_eq!(h.workflows.approvers(workflow.id()).await.unwrap().len(), 1);

        h.workflows.delete_approval_level(second.id(), ADMIN).await.unwrap();

        assert!(h.workflows.approvers(workflow.id()).await.unwrap().is_empty());
        let tx = h.store.begin().await.unwrap();
        assert!(tx.approvers().list().await.unwrap().is_empty());
    }
}
