//! Workflow authoring endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::Actor;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::assignment::{AssignmentApprover, AssignmentType};
use crate::domain::ids::{ApprovalLevelId, AssignmentApproverId, AssignmentId, UserId, WorkflowId};
use crate::domain::workflow::{StageType, Workflow, WorkflowStage, WorkflowVersion};
use crate::infrastructure::services::{
    AddApproverRequest, CloneWorkflowRequest, CreateWorkflowRequest, WorkflowDetails,
};

/// Body of `POST /workflows`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkflowBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    pub workflow_type: String,
    pub assignment_type: AssignmentType,
    pub assignment_id: i64,
}

impl From<CreateWorkflowBody> for CreateWorkflowRequest {
    fn from(body: CreateWorkflowBody) -> Self {
        let mut request = CreateWorkflowRequest::new(
            body.name,
            body.workflow_type,
            body.assignment_type,
            body.assignment_id,
        );
        if let Some(description) = body.description {
            request = request.with_description(description);
        }
        if let Some(id_number) = body.id_number {
            request = request.with_id_number(id_number);
        }
        request
    }
}

/// Body of `POST /workflows/{id}/stages`
#[derive(Debug, Clone, Deserialize)]
pub struct AddStageBody {
    pub name: String,
    pub stage_type: StageType,
}

/// Body of `POST /workflows/{id}/clone`
#[derive(Debug, Clone, Deserialize)]
pub struct CloneWorkflowBody {
    pub name: String,
    pub assignment_type: AssignmentType,
    pub assignment_id: i64,
}

/// Body of `POST /workflows/{id}/approvers`
#[derive(Debug, Clone, Deserialize)]
pub struct AddApproverBody {
    pub approval_level_id: ApprovalLevelId,
    pub user_id: UserId,
    /// Defaults to the workflow's default assignment
    #[serde(default)]
    pub assignment_id: Option<AssignmentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListApproversResponse {
    pub approvers: Vec<AssignmentApprover>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListWorkflowsResponse {
    pub workflows: Vec<Workflow>,
    pub total: usize,
}

pub fn create_workflows_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route("/{workflow_id}", get(get_workflow))
        .route("/{workflow_id}/stages", post(add_stage))
        .route("/{workflow_id}/publish", post(publish_workflow))
        .route("/{workflow_id}/clone", post(clone_workflow))
        .route(
            "/{workflow_id}/approvers",
            get(list_approvers).post(add_approver),
        )
        .route("/{workflow_id}/approvers/{approver_id}", delete(remove_approver))
}

/// GET /workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ListWorkflowsResponse>, ApiError> {
    let workflows = state.workflows.list().await?;
    let total = workflows.len();
    Ok(Json(ListWorkflowsResponse { workflows, total }))
}

/// POST /workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<CreateWorkflowBody>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    debug!(name = %body.name, "Creating workflow via API");
    let workflow = state.workflows.create(body.into(), actor).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<WorkflowId>,
) -> Result<Json<WorkflowDetails>, ApiError> {
    Ok(Json(state.workflows.get(workflow_id).await?))
}

/// POST /workflows/{id}/stages, added to the latest version
pub async fn add_stage(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(workflow_id): Path<WorkflowId>,
    Json(body): Json<AddStageBody>,
) -> Result<(StatusCode, Json<WorkflowStage>), ApiError> {
    let version = state.workflows.latest_version(workflow_id).await?;
    let stage = state
        .workflows
        .add_stage(version.id(), &body.name, body.stage_type, actor)
        .await?;
    Ok((StatusCode::CREATED, Json(stage)))
}

/// POST /workflows/{id}/publish, activates the latest version
pub async fn publish_workflow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(workflow_id): Path<WorkflowId>,
) -> Result<Json<WorkflowVersion>, ApiError> {
    let version = state.workflows.latest_version(workflow_id).await?;
    Ok(Json(state.workflows.publish(version.id(), actor).await?))
}

/// POST /workflows/{id}/clone
pub async fn clone_workflow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(workflow_id): Path<WorkflowId>,
    Json(body): Json<CloneWorkflowBody>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let request = CloneWorkflowRequest::new(
        workflow_id,
        body.name,
        body.assignment_type,
        body.assignment_id,
    );
    let workflow = state.cloner.clone_workflow(request, actor).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /workflows/{id}/approvers
pub async fn list_approvers(
    State(state): State<AppState>,
    Path(workflow_id): Path<WorkflowId>,
) -> Result<Json<ListApproversResponse>, ApiError> {
    let approvers = state.workflows.approvers(workflow_id).await?;
    let total = approvers.len();
    Ok(Json(ListApproversResponse { approvers, total }))
}

/// POST /workflows/{id}/approvers
pub async fn add_approver(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(workflow_id): Path<WorkflowId>,
    Json(body): Json<AddApproverBody>,
) -> Result<(StatusCode, Json<AssignmentApprover>), ApiError> {
    let mut request = AddApproverRequest::new(workflow_id, body.approval_level_id, body.user_id);
    if let Some(assignment_id) = body.assignment_id {
        request = request.with_assignment(assignment_id);
    }
    let approver = state.workflows.add_approver(request, actor).await?;
    Ok((StatusCode::CREATED, Json(approver)))
}

/// DELETE /workflows/{id}/approvers/{approver_id}
pub async fn remove_approver(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((_workflow_id, approver_id)): Path<(WorkflowId, AssignmentApproverId)>,
) -> Result<Json<AssignmentApprover>, ApiError> {
    Ok(Json(state.workflows.remove_approver(approver_id, actor).await?))
}
