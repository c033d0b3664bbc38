//! Workflow cloner - deep copy of a workflow's latest version into a new workflow

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::support::{create_workflow_shell, emit, ensure_capability, latest_version, WorkflowShell};
use crate::domain::assignment::{
    resolve_target, Assignment, AssignmentApprover, AssignmentDirectory, AssignmentType,
    UntitledLabels,
};
use crate::domain::capability::{Capability, CapabilityChecker, CapabilityScope};
use crate::domain::context::{path_contains, Context, ExtendedContext};
use crate::domain::ids::{ApprovalLevelId, AssignmentId, StageId, UserId, WorkflowId};
use crate::domain::notification::{
    DeliveryChannelResolver, EventSink, EventType, NotifiableEventPreference,
    NotificationPreference,
};
use crate::domain::storage::{ApprovalStore, StoreTransaction};
use crate::domain::workflow::{ApprovalError, StageNode, VersionGraph, Workflow};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_clone;

/// Request to clone a workflow
#[derive(Debug, Clone)]
pub struct CloneWorkflowRequest {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub assignment_type: AssignmentType,
    pub assignment_id: i64,
}

impl CloneWorkflowRequest {
    pub fn new(
        workflow_id: WorkflowId,
        name: impl Into<String>,
        assignment_type: AssignmentType,
        assignment_id: i64,
    ) -> Self {
        Self {
            workflow_id,
            name: name.into(),
            assignment_type,
            assignment_id,
        }
    }
}

/// Source and target of one stage copy
struct StageCopy<'a> {
    node: &'a StageNode,
    new_stage_id: StageId,
    source_context: &'a Context,
    new_context: &'a Context,
}

/// Clones workflows in a single transaction
pub struct WorkflowCloner {
    store: Arc<dyn ApprovalStore>,
    capabilities: Arc<dyn CapabilityChecker>,
    directory: Arc<dyn AssignmentDirectory>,
    channels: Arc<dyn DeliveryChannelResolver>,
    events: Arc<dyn EventSink>,
    labels: UntitledLabels,
}

impl std::fmt::Debug for WorkflowCloner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCloner").finish()
    }
}

impl WorkflowCloner {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        capabilities: Arc<dyn CapabilityChecker>,
        directory: Arc<dyn AssignmentDirectory>,
        channels: Arc<dyn DeliveryChannelResolver>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            capabilities,
            directory,
            channels,
            events,
            labels: UntitledLabels::default(),
        }
    }

    pub fn with_untitled_labels(mut self, labels: UntitledLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Clone the latest version of a workflow into a new workflow. Nothing is
    /// stored unless the whole copy succeeds.
    #[instrument(skip(self, request), fields(workflow_id = %request.workflow_id))]
    pub async fn clone_workflow(
        &self,
        request: CloneWorkflowRequest,
        actor: UserId,
    ) -> Result<Workflow, ApprovalError> {
        debug!(name = %request.name, "Cloning workflow");
        let started = Instant::now();

        let source = {
            let tx = self.store.begin().await?;
            tx.workflows().load(&request.workflow_id).await?
        };
        ensure_capability(
            self.capabilities.as_ref(),
            actor,
            Capability::CloneWorkflow,
            &CapabilityScope::context(source.context_id()),
        )
        .await?;

        match self.copy(&source, &request).await {
            Ok(workflow) => {
                record_clone(true, started.elapsed());
                info!(
                    source_id = %source.id(),
                    workflow_id = %workflow.id(),
                    "Cloned workflow"
                );
                emit(
                    self.events.as_ref(),
                    EventType::WorkflowCloned,
                    json!({
                        "source_workflow_id": source.id(),
                        "workflow_id": workflow.id(),
                        "user_id": actor,
                    }),
                )
                .await;
                Ok(workflow)
            }
            Err(e) => {
                record_clone(false, started.elapsed());
                warn!(source_id = %source.id(), error = %e, "Workflow clone failed");
                Err(ApprovalError::clone_failure(e.to_string()))
            }
        }
    }

    async fn copy(
        &self,
        source: &Workflow,
        request: &CloneWorkflowRequest,
    ) -> Result<Workflow, ApprovalError> {
        let target = resolve_target(
            self.directory.as_ref(),
            &self.labels,
            request.assignment_type,
            request.assignment_id,
        )
        .await?;

        let tx = self.store.begin().await?;
        let source_context = tx.contexts().load(&source.context_id()).await?;
        let parent_context_id = source_context.parent_id().ok_or_else(|| {
            DomainError::internal(format!(
                "Context {} of workflow {} has no parent",
                source_context.id(),
                source.id()
            ))
        })?;

        let created = create_workflow_shell(
            tx.as_ref(),
            WorkflowShell {
                name: &request.name,
                description: source.description(),
                id_number: None,
                workflow_type: source.workflow_type(),
                parent_context_id,
                target: &target,
            },
        )
        .await?;

        let source_version = latest_version(tx.as_ref(), source.id()).await?;
        let graph = VersionGraph::load(tx.as_ref(), source_version.id()).await?;

        // Every stage exists before interactions are remapped
        let mut stage_map = HashMap::with_capacity(graph.stages().len());
        for node in graph.stages() {
            let stage = tx
                .stages()
                .insert(node.stage().clone_into(created.version.id()))
                .await?;
            stage_map.insert(node.id(), stage.id());
        }

        let mut level_map = HashMap::new();
        for node in graph.stages() {
            let new_stage_id = stage_map.get(&node.id()).copied().ok_or_else(|| {
                DomainError::internal(format!("Stage {} was not copied", node.id()))
            })?;
            let copy = StageCopy {
                node,
                new_stage_id,
                source_context: &source_context,
                new_context: &created.context,
            };
            copy_stage_features(tx.as_ref(), &copy, &stage_map, &mut level_map).await?;
            copy_notification_preferences(tx.as_ref(), &copy).await?;
            self.copy_event_preferences(tx.as_ref(), &copy).await?;
        }

        let approvers =
            copy_default_approvers(tx.as_ref(), source.id(), created.assignment.id(), &level_map).await?;

        let mut assignment = created.assignment;
        assignment.activate();
        tx.assignments().update(assignment).await?;
        tx.commit().await?;

        debug!(stages = stage_map.len(), approvers, "Copied workflow version");
        Ok(created.workflow)
    }

    /// Event preferences keep their enabled flag; channel lists go through the
    /// resolver so only deliverable channels survive
    async fn copy_event_preferences(
        &self,
        tx: &dyn StoreTransaction,
        copy: &StageCopy<'_>,
    ) -> Result<(), DomainError> {
        let source_context = ExtendedContext::for_stage(copy.source_context.id(), copy.node.id());
        let target_context = ExtendedContext::for_stage(copy.new_context.id(), copy.new_stage_id);

        let preferences = tx
            .event_preferences()
            .find(&|p: &NotifiableEventPreference| p.extended_context() == &source_context)
            .await?;
        for preference in preferences {
            let resolver = preference.resolver_class_name();
            let channels = match preference.default_delivery_channels() {
                Some(list) => self.channels.from_list(resolver, list).await?,
                None => self.channels.defaults_for(resolver).await?,
            };
            tx.event_preferences()
                .insert(
                    NotifiableEventPreference::new(
                        target_context.clone(),
                        resolver,
                        preference.is_enabled(),
                    )
                    .with_default_delivery_channels(Some(channels)),
                )
                .await?;
        }
        Ok(())
    }
}

async fn copy_stage_features(
    tx: &dyn StoreTransaction,
    copy: &StageCopy<'_>,
    stage_map: &HashMap<StageId, StageId>,
    level_map: &mut HashMap<ApprovalLevelId, ApprovalLevelId>,
) -> Result<(), DomainError> {
    for formview in copy.node.formviews() {
        tx.formviews()
            .insert(formview.clone_into(copy.new_stage_id))
            .await?;
    }
    for level in copy.node.levels() {
        let cloned = tx
            .approval_levels()
            .insert(level.clone_into(copy.new_stage_id))
            .await?;
        level_map.insert(level.id(), cloned.id());
    }
    for interaction in copy.node.interactions() {
        let cloned = interaction.clone_into(copy.new_stage_id, |old| stage_map.get(&old).copied())?;
        tx.interactions().insert(cloned).await?;
    }
    Ok(())
}

/// Active approvers of the source's default assignment follow their level to
/// the new default assignment. Returns how many were copied.
async fn copy_default_approvers(
    tx: &dyn StoreTransaction,
    source_id: WorkflowId,
    new_assignment_id: AssignmentId,
    level_map: &HashMap<ApprovalLevelId, ApprovalLevelId>,
) -> Result<usize, DomainError> {
    let defaults: Vec<AssignmentId> = tx
        .assignments()
        .find(&|a: &Assignment| a.workflow_id() == source_id && a.is_default())
        .await?
        .iter()
        .map(|a| a.id())
        .collect();

    let mut approvers = tx
        .approvers()
        .find(&|a: &AssignmentApprover| a.is_active() && defaults.contains(&a.assignment_id()))
        .await?;
    approvers.sort_by_key(|a| a.id());

    let mut copied = 0;
    for approver in approvers {
        // Levels of older versions have no counterpart
        let Some(level_id) = level_map.get(&approver.approval_level_id()).copied() else {
            continue;
        };
        tx.approvers()
            .insert(approver.clone_into(new_assignment_id, level_id))
            .await?;
        copied += 1;
    }
    Ok(copied)
}

/// Copies the stage's notification preferences. A preference inherited from
/// a context outside the workflow's own branch is left behind; one whose
/// parent no longer exists is copied as a standalone preference.
async fn copy_notification_preferences(
    tx: &dyn StoreTransaction,
    copy: &StageCopy<'_>,
) -> Result<(), DomainError> {
    let source_context = ExtendedContext::for_stage(copy.source_context.id(), copy.node.id());
    let target_context = ExtendedContext::for_stage(copy.new_context.id(), copy.new_stage_id);

    let preferences = tx
        .notification_preferences()
        .find(&|p: &NotificationPreference| p.extended_context() == &source_context)
        .await?;
    for preference in preferences {
        let parent = match preference.parent_id() {
            Some(parent_id) => tx.notification_preferences().get(&parent_id).await?,
            None => None,
        };
        let parent_context = match parent {
            Some(parent) => tx.contexts().get(&parent.extended_context().context_id).await?,
            None => None,
        };
        if let Some(parent_context) = parent_context {
            if !path_contains(parent_context.path(), copy.source_context.path()) {
                debug!(
                    preference_id = %preference.id(),
                    parent_context_id = %parent_context.id(),
                    "Skipping notification preference inherited from outside the workflow"
                );
                continue;
            }
        }
        tx.notification_preferences()
            .insert(preference.clone_into(target_context.clone()))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::ActionType;
    use crate::domain::assignment::Assignment;
    use crate::domain::notification::MockDeliveryChannelResolver;
    use crate::domain::workflow::{FormviewVisibility, InteractionTransition, StageType, WorkflowStage};
    use crate::infrastructure::services::test_support::{
        harness, harness_with_channels, ADMIN, MANAGER,
    };
    use crate::infrastructure::services::{AddApproverRequest, CreateWorkflowRequest, WorkflowDetails};

    fn request(workflow_id: WorkflowId) -> CloneWorkflowRequest {
        CloneWorkflowRequest::new(workflow_id, "Leave (copy)", AssignmentType::Cohort, 5)
    }

    type StageShape = (String, StageType, usize, usize, Vec<(String, FormviewVisibility)>);

    fn shape(details: &WorkflowDetails) -> Vec<StageShape> {
        details
            .stages
            .iter()
            .map(|s| {
                let mut formviews: Vec<(String, FormviewVisibility)> = s
                    .formviews
                    .iter()
                    .map(|f| (f.field_key().to_string(), f.visibility()))
                    .collect();
                formviews.sort_by(|a, b| a.0.cmp(&b.0));
                (
                    s.stage.name().to_string(),
                    s.stage.stage_type(),
                    s.approval_levels.len(),
                    s.interactions.len(),
                    formviews,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_clone_copies_shape_with_new_ids() {
        let h = harness().await;
        let source = h
            .workflows
            .create(
                CreateWorkflowRequest::new("Leave", "leave", AssignmentType::Organisation, 1),
                ADMIN,
            )
            .await
            .unwrap();
        let version = h.workflows.latest_version(source.id()).await.unwrap();
        let request_stage = h
            .workflows
            .add_stage(version.id(), "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        for (field_key, visibility) in [
            ("reason", FormviewVisibility::EditableAndRequired),
            ("grade", FormviewVisibility::Hidden),
        ] {
            h.workflows
                .add_formview(request_stage.id(), field_key, visibility, None, ADMIN)
                .await
                .unwrap();
        }
        let review = h
            .workflows
            .add_stage(version.id(), "Review", StageType::Approvals, ADMIN)
            .await
            .unwrap();
        h.workflows.add_approval_level(review.id(), "", ADMIN).await.unwrap();
        h.workflows
            .add_stage(version.id(), "Done", StageType::Finished, ADMIN)
            .await
            .unwrap();
        h.workflows.publish(version.id(), ADMIN).await.unwrap();

        let cloned = h
            .cloner
            .clone_workflow(request(source.id()), ADMIN)
            .await
            .unwrap();

        assert_ne!(cloned.id(), source.id());
        assert_ne!(cloned.id_number(), source.id_number());
        assert_ne!(cloned.context_id(), source.context_id());
        assert_eq!(cloned.name(), "Leave (copy)");
        assert_eq!(cloned.workflow_type(), source.workflow_type());

        let source_details = h.workflows.get(source.id()).await.unwrap();
        let cloned_details = h.workflows.get(cloned.id()).await.unwrap();
        assert_eq!(shape(&source_details), shape(&cloned_details));
        assert_eq!(cloned_details.stages[0].formviews.len(), 2);
        assert_eq!(cloned_details.stages[1].approval_levels.len(), 2);
        assert!(cloned_details.stages[0]
            .formviews
            .iter()
            .all(|f| f.workflow_stage_id() == cloned_details.stages[0].stage.id()));

        let source_ids: Vec<StageId> = source_details.stages.iter().map(|s| s.stage.id()).collect();
        assert!(cloned_details
            .stages
            .iter()
            .all(|s| !source_ids.contains(&s.stage.id())));

        // Latest version is a draft, the default assignment is live
        assert!(cloned_details.versions[0].is_draft());
        let assignment: &Assignment = &cloned_details.assignments[0];
        assert!(assignment.is_active());
        assert!(assignment.is_default());
        assert_eq!(assignment.id_number(), "COHORT_5");
        assert_eq!(assignment.name(), "untitled_cohort");

        assert!(h.events.event_types().await.contains(&EventType::WorkflowCloned));
    }

    #[tokio::test]
    async fn test_clone_remaps_stage_targets() {
        let h = harness().await;
        let source = h
            .workflows
            .create(
                CreateWorkflowRequest::new("Leave", "leave", AssignmentType::Organisation, 1),
                ADMIN,
            )
            .await
            .unwrap();
        let version = h.workflows.latest_version(source.id()).await.unwrap();
        let request_stage = h
            .workflows
            .add_stage(version.id(), "Request", StageType::FormSubmission, ADMIN)
            .await
            .unwrap();
        let manager = h
            .workflows
            .add_stage(version.id(), "Manager", StageType::Approvals, ADMIN)
            .await
            .unwrap();
        h.workflows
            .add_interaction(
                manager.id(),
                ActionType::Reject,
                InteractionTransition::ToStage(request_stage.id()),
                ADMIN,
            )
            .await
            .unwrap();

        let cloned = h.cloner.clone_workflow(request(source.id()), ADMIN).await.unwrap();
        let details = h.workflows.get(cloned.id()).await.unwrap();
        let cloned_request = details.stages[0].stage.id();
        assert_ne!(cloned_request, request_stage.id());

        let reject = details.stages[1]
            .interactions
            .iter()
            .find(|i| i.action() == ActionType::Reject)
            .unwrap();
        assert_eq!(reject.transition(), InteractionTransition::ToStage(cloned_request));
    }

    #[tokio::test]
    async fn test_clone_notification_preferences() {
        let h = harness().await;
        let source = h.published_workflow(&[(StageType::Approvals, 1)]).await;
        let details = h.workflows.get(source.id()).await.unwrap();
        let stage_id = details.stages[1].stage.id();

        // One parent in the workflow's branch, one in a sibling branch
        let tx = h.store.begin().await.unwrap();
        let category = tx.contexts().load(&h.category_context_id).await.unwrap();
        let sibling = tx.contexts().insert(Context::child_of(&category)).await.unwrap();
        let inherited = tx
            .notification_preferences()
            .insert(NotificationPreference::new(
                ExtendedContext::natural(category.id()),
                "level_started",
            ))
            .await
            .unwrap();
        let foreign = tx
            .notification_preferences()
            .insert(NotificationPreference::new(
                ExtendedContext::natural(sibling.id()),
                "level_started",
            ))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stage_context = ExtendedContext::for_stage(source.context_id(), stage_id);
        for template in [
            NotificationPreference::new(stage_context.clone(), "level_started").with_title("own"),
            NotificationPreference::new(stage_context.clone(), "level_started")
                .with_title("inherited")
                .with_parent(&inherited),
            NotificationPreference::new(stage_context.clone(), "level_started")
                .with_title("foreign")
                .with_parent(&foreign),
        ] {
            h.workflows
                .add_stage_notification(stage_id, &template, ADMIN)
                .await
                .unwrap();
        }
        h.workflows
            .set_stage_event_preference(stage_id, "level_started", false, None, ADMIN)
            .await
            .unwrap();
        h.workflows
            .set_stage_event_preference(
                stage_id,
                "level_approved",
                true,
                Some(vec!["email".to_string(), "sms".to_string()]),
                ADMIN,
            )
            .await
            .unwrap();

        let cloned = h.cloner.clone_workflow(request(source.id()), ADMIN).await.unwrap();
        let cloned_details = h.workflows.get(cloned.id()).await.unwrap();
        let cloned_context =
            ExtendedContext::for_stage(cloned.context_id(), cloned_details.stages[1].stage.id());

        let tx = h.store.begin().await.unwrap();
        let mut titles: Vec<String> = tx
            .notification_preferences()
            .find(&|p: &NotificationPreference| p.extended_context() == &cloned_context)
            .await
            .unwrap()
            .iter()
            .filter_map(|p| p.title().map(str::to_string))
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["inherited".to_string(), "own".to_string()]);

        // Copies stand alone but remember the chain they came from
        let copies = tx
            .notification_preferences()
            .find(&|p: &NotificationPreference| p.extended_context() == &cloned_context)
            .await
            .unwrap();
        assert!(copies.iter().all(|p| p.parent_id().is_none()));
        let copied_inherited = copies.iter().find(|p| p.title() == Some("inherited")).unwrap();
        assert_eq!(copied_inherited.ancestor_id(), Some(inherited.id()));

        let mut events = tx
            .event_preferences()
            .find(&|p: &NotifiableEventPreference| p.extended_context() == &cloned_context)
            .await
            .unwrap();
        events.sort_by(|a, b| a.resolver_class_name().cmp(b.resolver_class_name()));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].resolver_class_name(), "level_approved");
        assert_eq!(events[0].default_delivery_channels(), Some(&["email".to_string()][..]));
        assert!(!events[1].is_enabled());
        assert_eq!(
            events[1].default_delivery_channels(),
            Some(&["email".to_string(), "popup".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_clone_copies_preference_with_missing_parent() {
        let h = harness().await;
        let source = h.published_workflow(&[(StageType::Approvals, 1)]).await;
        let details = h.workflows.get(source.id()).await.unwrap();
        let stage_id = details.stages[1].stage.id();

        let tx = h.store.begin().await.unwrap();
        let parent = tx
            .notification_preferences()
            .insert(NotificationPreference::new(
                ExtendedContext::natural(h.category_context_id),
                "stage_started",
            ))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let template = NotificationPreference::new(
            ExtendedContext::for_stage(source.context_id(), stage_id),
            "stage_started",
        )
        .with_title("orphan")
        .with_parent(&parent);
        h.workflows
            .add_stage_notification(stage_id, &template, ADMIN)
            .await
            .unwrap();

        let tx = h.store.begin().await.unwrap();
        tx.notification_preferences().delete(&parent.id()).await.unwrap();
        tx.commit().await.unwrap();

        let cloned = h.cloner.clone_workflow(request(source.id()), ADMIN).await.unwrap();
        let cloned_details = h.workflows.get(cloned.id()).await.unwrap();
        let cloned_context =
            ExtendedContext::for_stage(cloned.context_id(), cloned_details.stages[1].stage.id());

        let tx = h.store.begin().await.unwrap();
        let copies = tx
            .notification_preferences()
            .find(&|p: &NotificationPreference| p.extended_context() == &cloned_context)
            .await
            .unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].title(), Some("orphan"));
        assert_eq!(copies[0].parent_id(), None);
    }

    #[tokio::test]
    async fn test_clone_copies_default_approvers() {
        let h = harness().await;
        let source = h.published_workflow(&[(StageType::Approvals, 2)]).await;
        let source_details = h.workflows.get(source.id()).await.unwrap();
        let removed = source_details.approvers[1].id();
        h.workflows.remove_approver(removed, ADMIN).await.unwrap();
        h.workflows
            .add_approver(
                AddApproverRequest::new(
                    source.id(),
                    source_details.stages[1].approval_levels[0].id(),
                    UserId::new(21),
                ),
                ADMIN,
            )
            .await
            .unwrap();

        let cloned = h.cloner.clone_workflow(request(source.id()), ADMIN).await.unwrap();
        let details = h.workflows.get(cloned.id()).await.unwrap();
        let new_levels: Vec<ApprovalLevelId> =
            details.stages[1].approval_levels.iter().map(|l| l.id()).collect();

        let mut copied: Vec<(ApprovalLevelId, UserId)> = details
            .approvers
            .iter()
            .map(|a| (a.approval_level_id(), a.user_id()))
            .collect();
        copied.sort();
        assert_eq!(
            copied,
            vec![(new_levels[0], MANAGER), (new_levels[0], UserId::new(21))]
        );
        assert!(details
            .approvers
            .iter()
            .all(|a| a.assignment_id() == details.assignments[0].id() && a.is_active()));

        // The source keeps its own rows
        assert_eq!(h.workflows.approvers(source.id()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clone_failure_leaves_nothing_behind() {
        let mut channels = MockDeliveryChannelResolver::new();
        channels
            .expect_defaults_for()
            .returning(|_| Err(DomainError::internal("channel registry unavailable")));
        channels.expect_from_list().returning(|_, list| Ok(list.to_vec()));
        let h = harness_with_channels(Arc::new(channels)).await;

        let source = h.published_workflow(&[(StageType::Approvals, 2)]).await;
        let details = h.workflows.get(source.id()).await.unwrap();
        h.workflows
            .set_stage_event_preference(details.stages[1].stage.id(), "level_started", true, None, ADMIN)
            .await
            .unwrap();

        let tx = h.store.begin().await.unwrap();
        let stages_before = tx.stages().list().await.unwrap().len();
        let versions_before = tx.versions().list().await.unwrap().len();
        drop(tx);

        let result = h.cloner.clone_workflow(request(source.id()), ADMIN).await;
        assert!(matches!(result, Err(ApprovalError::CloneFailure(_))));

        let tx = h.store.begin().await.unwrap();
        assert_eq!(tx.workflows().list().await.unwrap().len(), 1);
        assert_eq!(tx.versions().list().await.unwrap().len(), versions_before);
        assert_eq!(tx.stages().list().await.unwrap().len(), stages_before);
        let stages: Vec<WorkflowStage> = tx.stages().list().await.unwrap();
        assert!(stages.iter().all(|s| s.workflow_version_id() == details.latest_version_id));
        assert!(!h.events.event_types().await.contains(&EventType::WorkflowCloned));
    }

    #[tokio::test]
    async fn test_clone_requires_capability() {
        let h = harness().await;
        let source = h.published_workflow(&[(StageType::Approvals, 1)]).await;

        let result = h
            .cloner
            .clone_workflow(request(source.id()), UserId::new(999))
            .await;
        assert!(matches!(result, Err(ApprovalError::AccessDenied(_))));
    }
}
