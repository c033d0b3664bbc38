//! Helpers shared by the approval services

use chrono::Utc;
use tracing::warn;

use crate::domain::assignment::{Assignment, AssignmentTarget};
use crate::domain::capability::{Capability, CapabilityChecker, CapabilityScope};
use crate::domain::context::Context;
use crate::domain::ids::{ContextId, UserId, WorkflowId};
use crate::domain::notification::{EventSink, EventType};
use crate::domain::storage::StoreTransaction;
use crate::domain::workflow::{
    validate_id_number, ApprovalError, Workflow, WorkflowVersion,
};
use crate::domain::DomainError;

/// Fails with `AccessDenied` unless the checker allows the capability
pub(crate) async fn ensure_capability(
    checker: &dyn CapabilityChecker,
    actor: UserId,
    capability: Capability,
    scope: &CapabilityScope,
) -> Result<(), ApprovalError> {
    if checker.can(actor, capability, scope).await? {
        return Ok(());
    }
    Err(ApprovalError::access_denied(format!(
        "User {} does not have capability {}",
        actor, capability
    )))
}

/// Emits an event; a failing sink is logged and never fails the caller
pub(crate) async fn emit(events: &dyn EventSink, event_type: EventType, payload: serde_json::Value) {
    if let Err(e) = events.emit(event_type, payload).await {
        warn!(event = %event_type, error = %e, "Failed to emit event");
    }
}

/// Latest version of a workflow: the one with the highest id
pub(crate) async fn latest_version(
    tx: &dyn StoreTransaction,
    workflow_id: WorkflowId,
) -> Result<WorkflowVersion, DomainError> {
    tx.versions()
        .find(&|v: &WorkflowVersion| v.workflow_id() == workflow_id)
        .await?
        .into_iter()
        .max_by_key(|v| v.id())
        .ok_or_else(|| DomainError::not_found(format!("Workflow {} has no version", workflow_id)))
}

pub(crate) async fn active_version(
    tx: &dyn StoreTransaction,
    workflow_id: WorkflowId,
) -> Result<Option<WorkflowVersion>, DomainError> {
    Ok(tx
        .versions()
        .find(&|v: &WorkflowVersion| v.workflow_id() == workflow_id && v.is_active())
        .await?
        .into_iter()
        .max_by_key(|v| v.id()))
}

/// Checks that no other workflow uses an id-number
pub(crate) async fn ensure_unique_id_number(
    tx: &dyn StoreTransaction,
    id_number: &str,
    except: Option<WorkflowId>,
) -> Result<(), DomainError> {
    let taken = tx
        .workflows()
        .find(&|w: &Workflow| w.id_number() == id_number && Some(w.id()) != except)
        .await?;
    if !taken.is_empty() {
        return Err(DomainError::validation(format!(
            "Workflow ID number '{}' is already in use",
            id_number
        )));
    }
    Ok(())
}

/// Generates an id-number no workflow uses yet, e.g. `workflow18c4f2a9d31`
pub(crate) async fn generate_id_number(tx: &dyn StoreTransaction) -> Result<String, DomainError> {
    let seed = Utc::now().timestamp_micros();
    let workflows = tx.workflows().list().await?;
    (0..)
        .map(|n| format!("workflow{:x}", seed + n))
        .find(|candidate| workflows.iter().all(|w| w.id_number() != candidate))
        .ok_or_else(|| DomainError::internal("Could not generate a workflow ID number"))
}

/// What a new workflow shell is made of
pub(crate) struct WorkflowShell<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub id_number: Option<&'a str>,
    pub workflow_type: &'a str,
    pub parent_context_id: ContextId,
    pub target: &'a AssignmentTarget,
}

/// Workflow, context, draft version and default assignment, as inserted
pub(crate) struct CreatedShell {
    pub workflow: Workflow,
    pub context: Context,
    pub version: WorkflowVersion,
    pub assignment: Assignment,
}

/// Inserts a workflow with its own context, a draft version and a draft
/// default assignment
pub(crate) async fn create_workflow_shell(
    tx: &dyn StoreTransaction,
    shell: WorkflowShell<'_>,
) -> Result<CreatedShell, DomainError> {
    let id_number = match shell.id_number.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id_number) => {
            validate_id_number(id_number)?;
            ensure_unique_id_number(tx, id_number, None).await?;
            id_number.to_string()
        }
        None => generate_id_number(tx).await?,
    };

    let parent = tx.contexts().load(&shell.parent_context_id).await?;
    let context = tx.contexts().insert(Context::child_of(&parent)).await?;

    let workflow = Workflow::new(shell.name, shell.workflow_type, context.id())?
        .with_description(shell.description)
        .with_id_number(id_number);
    let workflow = tx.workflows().insert(workflow).await?;

    let version = tx.versions().insert(WorkflowVersion::new(workflow.id())).await?;
    let assignment = tx
        .assignments()
        .insert(Assignment::new(workflow.id(), shell.target, true))
        .await?;

    Ok(CreatedShell {
        workflow,
        context,
        version,
        assignment,
    })
}
