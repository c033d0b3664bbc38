//! Demo command - drives one application through a reference workflow

use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use crate::config::{AppConfig, DirectoryEntryConfig, GrantConfig, GrantScope};
use crate::domain::application::{
    ActionType, ActivityType, Application, ApplicationAction, ApplicationSubmission,
};
use crate::domain::assignment::AssignmentType;
use crate::domain::ids::UserId;
use crate::domain::workflow::StageType;
use crate::infrastructure::notification::{InMemoryEventSink, RecordedEvent};
use crate::infrastructure::services::{
    ActionOutcome, AddApproverRequest, CreateApplicationRequest, CreateWorkflowRequest,
    WorkflowDetails,
};

const ADMIN: i64 = 2;
const APPLICANT: i64 = 10;
const MANAGER: i64 = 20;
const ORGANISATION: i64 = 1;

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Approval levels in the review stage
    #[arg(long, default_value_t = 2)]
    pub levels: usize,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

/// Everything the scenario produced
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub workflow: WorkflowDetails,
    pub application: Application,
    pub history: Vec<ApplicationAction>,
    pub submissions: Vec<ApplicationSubmission>,
    pub activities: Vec<ActivityType>,
    pub events: Vec<RecordedEvent>,
}

/// Run the scenario and print the report as JSON
pub async fn run(args: DemoArgs) -> anyhow::Result<()> {
    let report = run_scenario(args.levels).await?;
    let output = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", output);
    Ok(())
}

fn demo_config() -> AppConfig {
    let grant = |user_id: i64, capability: &str, scope: GrantScope| GrantConfig {
        user_id,
        capability: capability.to_string(),
        scope,
    };

    let mut config = AppConfig::default();
    config.approval.system_user_id = ADMIN;
    config.approval.grants = vec![
        grant(ADMIN, "create_workflow", GrantScope::Any),
        grant(ADMIN, "manage_workflow_stages", GrantScope::Any),
        grant(ADMIN, "edit_draft_workflow", GrantScope::Any),
        grant(ADMIN, "activate_workflow", GrantScope::Any),
        grant(ADMIN, "manage_individual_workflow_approvers", GrantScope::Any),
        grant(APPLICANT, "create_application", GrantScope::Owner),
        grant(APPLICANT, "edit_draft_application", GrantScope::Applicant),
        grant(MANAGER, "approve_application", GrantScope::Any),
    ];
    config.approval.directory = vec![DirectoryEntryConfig {
        assignment_type: AssignmentType::Organisation,
        id: ORGANISATION,
        name: "Finance".to_string(),
        id_number: "FIN".to_string(),
    }];
    config
}

/// FORM_SUBMISSION -> APPROVALS(levels) -> FINISHED, filled in and
/// submitted by the applicant and approved at every level by the manager
pub async fn run_scenario(levels: usize) -> anyhow::Result<DemoReport> {
    let events = Arc::new(InMemoryEventSink::new());
    let state = crate::create_app_state_with_events(&demo_config(), events.clone()).await?;
    let admin = UserId::new(ADMIN);

    let workflow = state
        .workflows
        .create(
            CreateWorkflowRequest::new(
                "Expense claim",
                "expenses",
                AssignmentType::Organisation,
                ORGANISATION,
            )
            .with_description("Reference approval scenario"),
            admin,
        )
        .await?;
    let version_id = state.workflows.latest_version(workflow.id()).await?.id();

    state
        .workflows
        .add_stage(version_id, "Request", StageType::FormSubmission, admin)
        .await?;
    let review = state
        .workflows
        .add_stage(version_id, "Review", StageType::Approvals, admin)
        .await?;
    for _ in 1..levels {
        state.workflows.add_approval_level(review.id(), "", admin).await?;
    }
    state
        .workflows
        .add_stage(version_id, "Done", StageType::Finished, admin)
        .await?;
    state.workflows.publish(version_id, admin).await?;

    let manager = UserId::new(MANAGER);
    let published = state.workflows.get(workflow.id()).await?;
    for level in published.stages.iter().flat_map(|s| s.approval_levels.iter()) {
        state
            .workflows
            .add_approver(AddApproverRequest::new(workflow.id(), level.id(), manager), admin)
            .await?;
    }

    let applicant = UserId::new(APPLICANT);
    let created = state
        .applications
        .create_application(CreateApplicationRequest::new(workflow.id(), applicant), applicant)
        .await?;
    let application_id = created.application.id();
    let mut activities = created.activities;
    state
        .applications
        .save_form_data(
            application_id,
            serde_json::json!({"purpose": "Conference travel", "amount": 420}),
            applicant,
        )
        .await?;

    let mut steps = vec![(ActionType::Submit, applicant)];
    steps.extend(std::iter::repeat_n((ActionType::Approve, manager), levels.max(1)));

    for (action, actor) in steps {
        match state
            .applications
            .apply_by_id(application_id, None, action, actor, None)
            .await?
        {
            ActionOutcome::Applied {
                activities: applied,
                ..
            } => activities.extend(applied),
            ActionOutcome::Rejected { reason } => {
                anyhow::bail!("{} by {} was rejected: {}", action, actor, reason.message)
            }
        }
    }

    Ok(DemoReport {
        workflow: state.workflows.get(workflow.id()).await?,
        application: state.applications.load(application_id).await?,
        history: state.applications.history(application_id).await?,
        submissions: state.applications.submissions(application_id).await?,
        activities,
        events: events.events().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::ApplicationStatus;

    #[tokio::test]
    async fn test_scenario_completes() {
        let report = run_scenario(2).await.unwrap();

        assert_eq!(report.application.status(), ApplicationStatus::Completed);
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.workflow.stages.len(), 3);
        assert_eq!(report.workflow.stages[1].approval_levels.len(), 2);
        assert_eq!(report.workflow.approvers.len(), 2);
        assert_eq!(report.submissions.len(), 1);
        assert!(report.submissions[0].is_published());
        assert_eq!(report.activities.first(), Some(&ActivityType::Creation));
        assert_eq!(report.activities.last(), Some(&ActivityType::Finished));
        assert!(!report.events.is_empty());
    }

    #[tokio::test]
    async fn test_single_level_scenario() {
        let report = run_scenario(1).await.unwrap();
        assert_eq!(report.history.len(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["application"]["status"], "COMPLETED");
    }
}
