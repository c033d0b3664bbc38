//! Application service - creates applications and runs the action pipeline

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::support::{active_version, emit, ensure_capability};
use crate::domain::application::{
    ActionType, ActivityType, Application, ApplicationAction, ApplicationState, ApplicationStatus,
    ApplicationSubmission, Transition,
};
use crate::domain::assignment::{Assignment, AssignmentApprover};
use crate::domain::capability::{Capability, CapabilityChecker, CapabilityScope};
use crate::domain::ids::{ApplicationId, ApplicationSubmissionId, AssignmentId, UserId, WorkflowId};
use crate::domain::notification::{EventSink, EventType};
use crate::domain::storage::{ApprovalStore, StoreTransaction};
use crate::domain::workflow::{
    ApprovalError, RejectionKind, StageNode, StageType, VersionGraph, Workflow,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_rejection, record_transition};

/// Request to start a new application
#[derive(Debug, Clone)]
pub struct CreateApplicationRequest {
    pub workflow_id: WorkflowId,
    pub assignment_id: Option<AssignmentId>,
    pub applicant_id: UserId,
}

impl CreateApplicationRequest {
    pub fn new(workflow_id: WorkflowId, applicant_id: UserId) -> Self {
        Self {
            workflow_id,
            assignment_id: None,
            applicant_id,
        }
    }

    /// Apply through a specific assignment instead of the workflow default
    pub fn with_assignment(mut self, assignment_id: AssignmentId) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }
}

/// Why an action was refused
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionReason {
    pub kind: RejectionKind,
    pub message: String,
}

/// Result of running an action through the pipeline
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied {
        application: Application,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<ApplicationAction>,
        activities: Vec<ActivityType>,
    },
    Rejected {
        reason: RejectionReason,
    },
}

impl ActionOutcome {
    fn rejected(error: &ApprovalError, kind: RejectionKind) -> Self {
        Self::Rejected {
            reason: RejectionReason {
                kind,
                message: error.to_string(),
            },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn application(&self) -> Option<&Application> {
        match self {
            Self::Applied { application, .. } => Some(application),
            Self::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Applied { .. } => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

/// A newly created application with the activities its creation recorded
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApplication {
    pub application: Application,
    pub activities: Vec<ActivityType>,
}

/// Application service
pub struct ApplicationService {
    store: Arc<dyn ApprovalStore>,
    capabilities: Arc<dyn CapabilityChecker>,
    events: Arc<dyn EventSink>,
    system_user_id: UserId,
}

impl std::fmt::Debug for ApplicationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationService")
            .field("system_user_id", &self.system_user_id)
            .finish()
    }
}

impl ApplicationService {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        capabilities: Arc<dyn CapabilityChecker>,
        events: Arc<dyn EventSink>,
        system_user_id: UserId,
    ) -> Self {
        Self {
            store,
            capabilities,
            events,
            system_user_id,
        }
    }

    /// Load an application
    pub async fn load(&self, application_id: ApplicationId) -> Result<Application, ApprovalError> {
        let tx = self.store.begin().await?;
        Ok(tx.applications().load(&application_id).await?)
    }

    /// Actions taken on an application, oldest first
    pub async fn history(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ApplicationAction>, ApprovalError> {
        let tx = self.store.begin().await?;
        tx.applications().load(&application_id).await?;
        let mut actions = tx
            .actions()
            .find(&|a: &ApplicationAction| a.application_id() == application_id)
            .await?;
        actions.sort_by_key(|a| a.id());
        Ok(actions)
    }

    /// Form submissions of an application, oldest first
    pub async fn submissions(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ApplicationSubmission>, ApprovalError> {
        let tx = self.store.begin().await?;
        tx.applications().load(&application_id).await?;
        let mut submissions = tx
            .submissions()
            .find(&|s: &ApplicationSubmission| s.application_id() == application_id)
            .await?;
        submissions.sort_by_key(|s| s.id());
        Ok(submissions)
    }

    /// Save the applicant's form data for the current form submission stage.
    /// The data stays unpublished until the stage is submitted.
    #[instrument(skip(self, form_data))]
    pub async fn save_form_data(
        &self,
        application_id: ApplicationId,
        form_data: Value,
        actor: UserId,
    ) -> Result<ApplicationSubmission, ApprovalError> {
        let tx = self.store.begin().await?;
        let application = tx.applications().load(&application_id).await?;
        ensure_not_terminal(&application)?;

        let graph = VersionGraph::load(tx.as_ref(), application.workflow_version_id()).await?;
        let current = application.current_state();
        let node = graph.node(current.stage_id())?;
        if node.stage_type() != StageType::FormSubmission {
            return Err(ApprovalError::action_not_allowed(format!(
                "Form data can not be saved in a {} stage",
                node.stage_type().label().to_lowercase()
            )));
        }
        self.ensure_application_capability(
            tx.as_ref(),
            &application,
            &current,
            Capability::EditDraftApplication,
            actor,
        )
        .await?;

        let form_data = ApplicationSubmission::form_data_for_stage(form_data, node.formviews())?;
        let stage_id = node.id();
        let pending = tx
            .submissions()
            .find(&|s: &ApplicationSubmission| {
                s.is_current_for(application_id, stage_id) && !s.is_published()
            })
            .await?
            .into_iter()
            .max_by_key(|s| s.id());

        let submission = match pending {
            Some(mut submission) => {
                submission.set_form_data(form_data, actor);
                tx.submissions().update(submission).await?
            }
            None => {
                tx.submissions()
                    .insert(ApplicationSubmission::new(application_id, stage_id, actor, form_data))
                    .await?
            }
        };
        commit(tx).await?;

        debug!(submission_id = %submission.id(), stage_id = %stage_id, "Saved form data");
        Ok(submission)
    }

    /// Start an application in the first stage of the workflow's active version
    #[instrument(skip(self, request), fields(workflow_id = %request.workflow_id))]
    pub async fn create_application(
        &self,
        request: CreateApplicationRequest,
        actor: UserId,
    ) -> Result<CreatedApplication, ApprovalError> {
        debug!("Creating application");
        let tx = self.store.begin().await?;
        let workflow = tx.workflows().load(&request.workflow_id).await?;
        let version = active_version(tx.as_ref(), workflow.id())
            .await?
            .ok_or_else(|| {
                ApprovalError::action_not_allowed(format!(
                    "Workflow {} has no active version",
                    workflow.id()
                ))
            })?;
        let assignment = self
            .application_assignment(tx.as_ref(), &workflow, request.assignment_id)
            .await?;

        ensure_capability(
            self.capabilities.as_ref(),
            actor,
            Capability::CreateApplication,
            &CapabilityScope::context(workflow.context_id())
                .with_assignment(assignment.id())
                .with_applicant(request.applicant_id)
                .with_owner(actor),
        )
        .await?;

        let graph = VersionGraph::load(tx.as_ref(), version.id()).await?;
        let first = graph.first_stage().ok_or_else(|| {
            ApprovalError::invalid_transition(format!("Workflow version {} has no stages", version.id()))
        })?;
        let manager = graph.state_manager(first.id())?;
        let state = manager.creation_state()?;
        let mut activities = vec![ActivityType::Creation];
        activities.extend(manager.on_state_entry(None, &state));
        drop(manager);

        let application = tx
            .applications()
            .insert(Application::new(
                version.id(),
                assignment.id(),
                request.applicant_id,
                actor,
                state,
            ))
            .await?;
        tx.commit().await?;

        info!(
            application_id = %application.id(),
            applicant_id = %application.user_id(),
            "Created application"
        );
        emit(
            self.events.as_ref(),
            EventType::ApplicationCreated,
            json!({
                "application_id": application.id(),
                "workflow_version_id": version.id(),
                "user_id": actor,
            }),
        )
        .await;
        let state = application.current_state();
        self.emit_activities(application.id(), &state, &state, &activities, actor)
            .await;

        Ok(CreatedApplication {
            application,
            activities,
        })
    }

    /// Apply an action to the application as the caller last saw it.
    ///
    /// Policy, authorization and concurrency refusals come back as
    /// [`ActionOutcome::Rejected`]; anything else is an error.
    #[instrument(skip(self, snapshot, comment), fields(application_id = %snapshot.id()))]
    pub async fn apply(
        &self,
        snapshot: &Application,
        action: ActionType,
        actor: UserId,
        comment: Option<String>,
    ) -> Result<ActionOutcome, ApprovalError> {
        debug!(action = %action, actor = %actor, "Applying action");
        match self.try_apply(snapshot, action, actor, comment).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Self::reject(e, action),
        }
    }

    /// Apply an action to a stored application. `expected_revision` guards
    /// against acting on an outdated view.
    pub async fn apply_by_id(
        &self,
        application_id: ApplicationId,
        expected_revision: Option<u64>,
        action: ActionType,
        actor: UserId,
        comment: Option<String>,
    ) -> Result<ActionOutcome, ApprovalError> {
        let snapshot = self.load(application_id).await?;
        if let Some(expected) = expected_revision {
            if expected != snapshot.current_revision() {
                return Self::reject(stale_revision(expected, snapshot.current_revision()), action);
            }
        }
        self.apply(&snapshot, action, actor, comment).await
    }

    /// System-driven advance out of a waiting stage
    #[instrument(skip(self))]
    pub async fn progress(&self, application_id: ApplicationId) -> Result<Application, ApprovalError> {
        let tx = self.store.begin().await?;
        let mut application = tx.applications().load(&application_id).await?;
        ensure_not_terminal(&application)?;

        let graph = VersionGraph::load(tx.as_ref(), application.workflow_version_id()).await?;
        let current = application.current_state();
        let transition = graph.state_manager(current.stage_id())?.progress(&current)?;

        application.apply_transition(&transition, None, self.system_user_id);
        let application = update_application(tx.as_ref(), application).await?;
        commit(tx).await?;

        info!(
            application_id = %application_id,
            stage_id = %application.current_stage_id(),
            "Progressed application"
        );
        record_transition(
            current.stage_type().enum_name(),
            "progress",
            &application.status().to_string(),
        );
        emit(
            self.events.as_ref(),
            EventType::ApplicationProgressed,
            json!({
                "application_id": application_id,
                "from_stage_id": current.stage_id(),
                "to_stage_id": application.current_stage_id(),
                "user_id": self.system_user_id,
            }),
        )
        .await;
        self.emit_activities(
            application_id,
            &transition.from,
            &transition.to,
            &transition.activities,
            self.system_user_id,
        )
        .await;
        if application.status() == ApplicationStatus::Completed {
            self.emit_status(&application, self.system_user_id).await;
        }

        Ok(application)
    }

    // Pipeline

    async fn try_apply(
        &self,
        snapshot: &Application,
        action: ActionType,
        actor: UserId,
        comment: Option<String>,
    ) -> Result<ActionOutcome, ApprovalError> {
        let tx = self.store.begin().await?;
        let mut application = tx.applications().load(&snapshot.id()).await?;
        if snapshot.current_revision() != application.current_revision() {
            return Err(stale_revision(
                snapshot.current_revision(),
                application.current_revision(),
            ));
        }
        ensure_not_terminal(&application)?;

        let graph = VersionGraph::load(tx.as_ref(), application.workflow_version_id()).await?;
        let current = application.current_state();
        let transition = graph
            .state_manager(current.stage_id())?
            .transition(&current, action)?;

        self.ensure_application_capability(
            tx.as_ref(),
            &application,
            &current,
            Capability::for_action(action),
            actor,
        )
        .await?;
        if matches!(action, ActionType::Approve | ActionType::Reject) {
            ensure_level_approver(tx.as_ref(), &application, &current, actor).await?;
        }
        if action == ActionType::Submit {
            let submission =
                publish_submission(tx.as_ref(), application.id(), graph.node(current.stage_id())?, actor)
                    .await?;
            debug!(submission_id = %submission.id(), "Published form submission");
        }

        application.apply_transition(&transition, Some(action), actor);
        let application = update_application(tx.as_ref(), application).await?;
        let record = tx
            .actions()
            .insert(
                ApplicationAction::new(
                    application.id(),
                    actor,
                    current.stage_id(),
                    current.approval_level_id(),
                    action,
                )
                .with_comment(comment),
            )
            .await?;
        commit(tx).await?;

        info!(
            application_id = %application.id(),
            action = %action,
            status = %application.status(),
            "Applied application action"
        );
        record_transition(
            current.stage_type().enum_name(),
            action.enum_name(),
            &application.status().to_string(),
        );
        self.emit_applied(&application, &record, &transition).await;

        Ok(ActionOutcome::Applied {
            application,
            action: Some(record),
            activities: transition.activities,
        })
    }

    fn reject(error: ApprovalError, action: ActionType) -> Result<ActionOutcome, ApprovalError> {
        match error.rejection_kind() {
            Some(kind) => {
                warn!(action = %action, reason = kind.name(), error = %error, "Rejected application action");
                record_rejection(action.enum_name(), kind.name());
                Ok(ActionOutcome::rejected(&error, kind))
            }
            None => Err(error),
        }
    }

    async fn ensure_application_capability(
        &self,
        tx: &dyn StoreTransaction,
        application: &Application,
        current: &ApplicationState,
        capability: Capability,
        actor: UserId,
    ) -> Result<(), ApprovalError> {
        let version = tx.versions().load(&application.workflow_version_id()).await?;
        let workflow = tx.workflows().load(&version.workflow_id()).await?;
        ensure_capability(
            self.capabilities.as_ref(),
            actor,
            capability,
            &CapabilityScope::context(workflow.context_id())
                .with_assignment(application.assignment_id())
                .with_applicant(application.user_id())
                .with_owner(application.creator_id())
                .with_approval_level(current.approval_level_id()),
        )
        .await
    }

    /// The requested assignment, or the workflow's default one; it must be active
    async fn application_assignment(
        &self,
        tx: &dyn StoreTransaction,
        workflow: &Workflow,
        assignment_id: Option<AssignmentId>,
    ) -> Result<Assignment, ApprovalError> {
        let workflow_id = workflow.id();
        let assignment = match assignment_id {
            Some(id) => tx
                .assignments()
                .get(&id)
                .await?
                .filter(|a| a.workflow_id() == workflow_id),
            None => tx
                .assignments()
                .find(&|a: &Assignment| a.workflow_id() == workflow_id && a.is_default())
                .await?
                .into_iter()
                .next(),
        }
        .ok_or_else(|| {
            DomainError::not_found(format!("No assignment found for workflow {}", workflow_id))
        })?;

        if !assignment.is_active() {
            return Err(ApprovalError::action_not_allowed(format!(
                "Assignment {} is not active",
                assignment.id()
            )));
        }
        Ok(assignment)
    }

    // Events

    async fn emit_applied(
        &self,
        application: &Application,
        record: &ApplicationAction,
        transition: &Transition,
    ) {
        emit(
            self.events.as_ref(),
            EventType::ApplicationActionApplied,
            json!({
                "application_id": application.id(),
                "action_id": record.id(),
                "action": record.action(),
                "user_id": record.user_id(),
                "from_stage_id": transition.from.stage_id(),
                "to_stage_id": transition.to.stage_id(),
                "status": application.status(),
            }),
        )
        .await;
        self.emit_activities(
            application.id(),
            &transition.from,
            &transition.to,
            &transition.activities,
            record.user_id(),
        )
        .await;

        if record.action() == ActionType::Submit {
            emit(
                self.events.as_ref(),
                EventType::ApplicationSubmitted,
                json!({"application_id": application.id(), "user_id": record.user_id()}),
            )
            .await;
        }
        self.emit_status(application, record.user_id()).await;
    }

    /// One event per activity, placed at the state it happened in: entry
    /// activities at `to`, everything else at `from`
    async fn emit_activities(
        &self,
        application_id: ApplicationId,
        from: &ApplicationState,
        to: &ApplicationState,
        activities: &[ActivityType],
        actor: UserId,
    ) {
        for activity in activities {
            let at = if activity.is_entry() { to } else { from };
            emit(
                self.events.as_ref(),
                EventType::ActivityCreated,
                json!({
                    "application_id": application_id,
                    "activity": activity,
                    "stage_id": at.stage_id(),
                    "approval_level_id": at.approval_level_id(),
                    "user_id": actor,
                }),
            )
            .await;
        }
    }

    /// Terminal status notifications
    async fn emit_status(&self, application: &Application, actor: UserId) {
        let event_type = match application.status() {
            ApplicationStatus::Rejected => EventType::ApplicationRejected,
            ApplicationStatus::Withdrawn => EventType::ApplicationWithdrawn,
            ApplicationStatus::Completed => EventType::ApplicationCompleted,
            ApplicationStatus::Draft | ApplicationStatus::InProgress => return,
        };
        emit(
            self.events.as_ref(),
            event_type,
            json!({"application_id": application.id(), "user_id": actor}),
        )
        .await;
    }
}

fn stale_revision(seen: u64, stored: u64) -> ApprovalError {
    ApprovalError::stale(format!(
        "Application was modified since it was read (revision {} is now {})",
        seen, stored
    ))
}

fn ensure_not_terminal(application: &Application) -> Result<(), ApprovalError> {
    if application.status().is_terminal() {
        return Err(ApprovalError::invalid_transition(format!(
            "Application {} is {} and can no longer change",
            application.id(),
            application.status()
        )));
    }
    Ok(())
}

/// Approve and reject belong to the active approvers of the current level
async fn ensure_level_approver(
    tx: &dyn StoreTransaction,
    application: &Application,
    current: &ApplicationState,
    actor: UserId,
) -> Result<(), ApprovalError> {
    let Some(level_id) = current.approval_level_id() else {
        return Err(ApprovalError::invalid_transition(format!(
            "Application {} is not at an approval level",
            application.id()
        )));
    };
    let assignment_id = application.assignment_id();
    let approvers = tx
        .approvers()
        .find(&|a: &AssignmentApprover| a.authorizes(assignment_id, level_id, actor))
        .await?;
    if approvers.is_empty() {
        return Err(ApprovalError::access_denied(format!(
            "User {} is not an approver of approval level {} for assignment {}",
            actor, level_id, assignment_id
        )));
    }
    Ok(())
}

/// Publishes the stage's pending submission, or a copy of the latest data
/// when nothing was saved since the last submit. Earlier submissions for the
/// stage are superseded.
async fn publish_submission(
    tx: &dyn StoreTransaction,
    application_id: ApplicationId,
    node: &StageNode,
    actor: UserId,
) -> Result<ApplicationSubmission, ApprovalError> {
    let stage_id = node.id();
    let mut current = tx
        .submissions()
        .find(&|s: &ApplicationSubmission| s.is_current_for(application_id, stage_id))
        .await?;
    current.sort_by_key(|s| s.id());

    let mut submission = match current.iter().rposition(|s| !s.is_published()) {
        Some(index) => current.remove(index),
        None => {
            let form_data = current
                .last()
                .map(|s| s.form_data().clone())
                .unwrap_or_else(|| json!({}));
            ApplicationSubmission::new(application_id, stage_id, actor, form_data)
        }
    };

    let missing = submission.missing_required_fields(node.formviews());
    if !missing.is_empty() {
        return Err(ApprovalError::action_not_allowed(format!(
            "Required fields are missing: {}",
            missing.join(", ")
        )));
    }

    for mut earlier in current {
        earlier.supersede();
        tx.submissions().update(earlier).await?;
    }
    submission.publish(actor)?;
    let submission = if submission.id() == ApplicationSubmissionId::UNSAVED {
        tx.submissions().insert(submission).await?
    } else {
        tx.submissions().update(submission).await?
    };
    Ok(submission)
}

async fn update_application(
    tx: &dyn StoreTransaction,
    application: Application,
) -> Result<Application, ApprovalError> {
    let id = application.id();
    tx.applications().update(application).await.map_err(|e| {
        if e.is_conflict() {
            ApprovalError::stale(format!("Application {} was modified concurrently", id))
        } else {
            e.into()
        }
    })
}

async fn commit(tx: Box<dyn StoreTransaction>) -> Result<(), ApprovalError> {
    tx.commit().await.map_err(|e| {
        if e.is_conflict() {
            ApprovalError::stale(e.to_string())
        } else {
            e.into()
        }
    })
}
