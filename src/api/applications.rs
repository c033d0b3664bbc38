//! Application endpoints: creation, lookup and the action pipeline

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::Actor;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::application::{
    ActionType, Application, ApplicationAction, ApplicationSubmission,
};
use crate::domain::ids::{ApplicationId, AssignmentId, UserId, WorkflowId};
use crate::infrastructure::services::{ActionOutcome, CreateApplicationRequest, CreatedApplication};

/// Body of `POST /applications`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplicationBody {
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub assignment_id: Option<AssignmentId>,
    /// Defaults to the acting user
    #[serde(default)]
    pub applicant_id: Option<UserId>,
}

/// Body of `POST /applications/{id}/actions`
#[derive(Debug, Clone, Deserialize)]
pub struct ActionBody {
    pub action: ActionType,
    #[serde(default)]
    pub comment: Option<String>,
    /// Revision the caller last saw; omitted means the stored one
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

/// Body of `PUT /applications/{id}/form_data`
#[derive(Debug, Clone, Deserialize)]
pub struct FormDataBody {
    pub form_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSubmissionsResponse {
    pub submissions: Vec<ApplicationSubmission>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationResponse {
    pub application: Application,
    pub history: Vec<ApplicationAction>,
}

pub fn create_applications_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_application))
        .route("/{application_id}", get(get_application))
        .route("/{application_id}/actions", post(apply_action))
        .route("/{application_id}/form_data", put(save_form_data))
        .route("/{application_id}/submissions", get(list_submissions))
}

/// POST /applications
pub async fn create_application(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<CreateApplicationBody>,
) -> Result<(StatusCode, Json<CreatedApplication>), ApiError> {
    let mut request =
        CreateApplicationRequest::new(body.workflow_id, body.applicant_id.unwrap_or(actor));
    if let Some(assignment_id) = body.assignment_id {
        request = request.with_assignment(assignment_id);
    }

    let created = state.applications.create_application(request, actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /applications/{id}
pub async fn get_application(
    State(state): State<AppState>,
    Path(application_id): Path<ApplicationId>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let application = state.applications.load(application_id).await?;
    let history = state.applications.history(application_id).await?;
    Ok(Json(ApplicationResponse {
        application,
        history,
    }))
}

/// POST /applications/{id}/actions
///
/// A refused action answers 403 (access) or 409 (policy, terminal state,
/// stale revision) with the rejection kind as the error code.
pub async fn apply_action(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(application_id): Path<ApplicationId>,
    Json(body): Json<ActionBody>,
) -> Result<Json<ActionOutcome>, ApiError> {
    debug!(application_id = %application_id, action = %body.action, "Applying action via API");
    let outcome = state
        .applications
        .apply_by_id(
            application_id,
            body.expected_revision,
            body.action,
            actor,
            body.comment,
        )
        .await?;

    match outcome {
        ActionOutcome::Rejected { reason } => Err(reason.into()),
        applied => Ok(Json(applied)),
    }
}

/// PUT /applications/{id}/form_data
pub async fn save_form_data(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(application_id): Path<ApplicationId>,
    Json(body): Json<FormDataBody>,
) -> Result<Json<ApplicationSubmission>, ApiError> {
    let submission = state
        .applications
        .save_form_data(application_id, body.form_data, actor)
        .await?;
    Ok(Json(submission))
}

/// GET /applications/{id}/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    Path(application_id): Path<ApplicationId>,
) -> Result<Json<ListSubmissionsResponse>, ApiError> {
    let submissions = state.applications.submissions(application_id).await?;
    let total = submissions.len();
    Ok(Json(ListSubmissionsResponse { submissions, total }))
}
