use super::{
    ensure_action_available, ensure_stage_type, leave_stage, move_to, stage_entry, stage_exit,
    stay, StateManager,
};
use crate::domain::application::{
    ActionType, ActivityType, ApplicationState, ApplicationStatus, Transition,
};
use crate::domain::workflow::error::ApprovalError;
use crate::domain::workflow::graph::{StageNode, VersionGraph};
use crate::domain::workflow::stage_type::StageType;

/// Stage where the applicant fills in and submits the form.
///
/// Entering a form submission stage always puts the application back in
/// draft, so the applicant has to submit again.
pub struct FormSubmissionStateManager<'g> {
    graph: &'g VersionGraph,
    node: &'g StageNode,
}

impl<'g> FormSubmissionStateManager<'g> {
    pub fn new(graph: &'g VersionGraph, node: &'g StageNode) -> Result<Self, ApprovalError> {
        ensure_stage_type(node, StageType::FormSubmission)?;
        Ok(Self { graph, node })
    }

    /// First later approvals stage, else the finished stage
    fn submission_target(&self) -> Result<ApplicationState, ApprovalError> {
        let target = self
            .graph
            .first_later_of_type(self.node.id(), StageType::Approvals)
            .or_else(|| self.graph.finished_stage())
            .ok_or_else(|| {
                ApprovalError::invalid_transition(format!(
                    "Stage '{}' is not followed by an approvals or finished stage",
                    self.node.stage().name()
                ))
            })?;
        self.graph.initial_state(target.id())
    }
}

impl StateManager for FormSubmissionStateManager<'_> {
    fn stage(&self) -> &StageNode {
        self.node
    }

    fn creation_state(&self) -> Result<ApplicationState, ApprovalError> {
        Ok(self.initial_state())
    }

    fn initial_state(&self) -> ApplicationState {
        ApplicationState::new(self.node.id(), StageType::FormSubmission, None, true)
    }

    fn next_state(&self, _current: &ApplicationState) -> Result<ApplicationState, ApprovalError> {
        let next = self.graph.next_stage(self.node.id()).ok_or_else(|| {
            ApprovalError::invalid_transition(format!(
                "Stage '{}' is the last stage",
                self.node.stage().name()
            ))
        })?;
        self.graph.initial_state(next.id())
    }

    fn previous_state(&self, _current: &ApplicationState) -> Result<ApplicationState, ApprovalError> {
        let previous = self.graph.previous_stage(self.node.id()).ok_or_else(|| {
            ApprovalError::invalid_transition(format!(
                "Stage '{}' is the first stage",
                self.node.stage().name()
            ))
        })?;
        self.graph.initial_state(previous.id())
    }

    fn transition(
        &self,
        current: &ApplicationState,
        action: ActionType,
    ) -> Result<Transition, ApprovalError> {
        ensure_action_available(self.node, action)?;

        match action {
            ActionType::Submit => {
                if !current.is_draft() {
                    return Err(ApprovalError::action_not_allowed(
                        "The application has already been submitted",
                    ));
                }
                let to = leave_stage(self.graph, self.node, current, action, || {
                    self.submission_target()
                })?;
                move_to(self.graph, current, to, vec![ActivityType::StageSubmitted])
            }
            _ => Ok(stay(
                current,
                ApplicationStatus::Withdrawn,
                vec![ActivityType::for_action(action)],
            )),
        }
    }

    fn on_state_entry(&self, from: Option<&ApplicationState>, to: &ApplicationState) -> Vec<ActivityType> {
        stage_entry(from, to)
    }

    fn on_state_exit(&self, from: &ApplicationState, to: &ApplicationState) -> Vec<ActivityType> {
        stage_exit(from, to)
    }
}
