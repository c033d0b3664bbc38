//! Per-stage-type state managers
//!
//! A state manager answers, for one stage of a [`VersionGraph`], where an
//! application goes when an action is taken there, and which activities the
//! move records on the way out of the old state and into the new one.

mod approvals;
mod finished;
mod form_submission;
mod waiting;

pub use approvals::ApprovalsStateManager;
pub use finished::FinishedStateManager;
pub use form_submission::FormSubmissionStateManager;
pub use waiting::WaitingStateManager;

use super::error::ApprovalError;
use super::graph::{StageNode, VersionGraph};
use super::stage::InteractionTransition;
use super::stage_type::StageType;
use crate::domain::application::{
    ActionType, ActivityType, ApplicationState, ApplicationStatus, Transition,
};
use crate::domain::ids::StageId;

/// Behaviour of one stage type, bound to a stage of a version graph
pub trait StateManager: Send + Sync {
    /// The stage this manager is bound to
    fn stage(&self) -> &StageNode;

    /// State of an application created at this stage
    fn creation_state(&self) -> Result<ApplicationState, ApprovalError>;

    /// State of an application entering this stage
    fn initial_state(&self) -> ApplicationState;

    /// Following state in stage order
    fn next_state(&self, current: &ApplicationState) -> Result<ApplicationState, ApprovalError>;

    /// Initial state of the preceding stage
    fn previous_state(&self, current: &ApplicationState) -> Result<ApplicationState, ApprovalError>;

    /// Computes the effect of a user action taken at this stage
    fn transition(
        &self,
        current: &ApplicationState,
        action: ActionType,
    ) -> Result<Transition, ApprovalError>;

    /// System-driven advance out of this stage
    fn progress(&self, _current: &ApplicationState) -> Result<Transition, ApprovalError> {
        Err(ApprovalError::invalid_transition(format!(
            "An application can not be progressed out of a {} stage",
            self.stage().stage_type().label().to_lowercase()
        )))
    }

    /// Activities recorded when an application enters `to`
    fn on_state_entry(&self, from: Option<&ApplicationState>, to: &ApplicationState) -> Vec<ActivityType>;

    /// Activities recorded when an application leaves `from`
    fn on_state_exit(&self, from: &ApplicationState, to: &ApplicationState) -> Vec<ActivityType>;
}

impl StageType {
    /// Builds the state manager of this type for a stage of the graph
    pub fn state_manager<'g>(
        &self,
        graph: &'g VersionGraph,
        stage_id: StageId,
    ) -> Result<Box<dyn StateManager + 'g>, ApprovalError> {
        let node = graph.node(stage_id)?;
        Ok(match self {
            Self::FormSubmission => Box::new(FormSubmissionStateManager::new(graph, node)?),
            Self::Approvals => Box::new(ApprovalsStateManager::new(graph, node)?),
            Self::Waiting => Box::new(WaitingStateManager::new(graph, node)?),
            Self::Finished => Box::new(FinishedStateManager::new(graph, node)?),
        })
    }
}

impl VersionGraph {
    /// State manager of a stage, chosen by the stage's own type
    pub fn state_manager(&self, stage_id: StageId) -> Result<Box<dyn StateManager + '_>, ApprovalError> {
        let stage_type = self.node(stage_id)?.stage_type();
        stage_type.state_manager(self, stage_id)
    }

    /// Initial state of a stage
    pub fn initial_state(&self, stage_id: StageId) -> Result<ApplicationState, ApprovalError> {
        Ok(self.state_manager(stage_id)?.initial_state())
    }
}

/// Refuses to bind a manager to a stage of another type
fn ensure_stage_type(node: &StageNode, expected: StageType) -> Result<(), ApprovalError> {
    if node.stage_type() != expected {
        return Err(ApprovalError::undefined_stage_type(format!(
            "Application stage is not of type {}",
            expected
        )));
    }
    Ok(())
}

/// Refuses actions the stage type does not offer
fn ensure_action_available(node: &StageNode, action: ActionType) -> Result<(), ApprovalError> {
    let stage_type = node.stage_type();
    if stage_type.is_terminal() {
        return Err(ApprovalError::invalid_transition(format!(
            "No action can be taken in the {} stage '{}'",
            stage_type.label().to_lowercase(),
            node.stage().name()
        )));
    }
    if !stage_type.allows(action) {
        return Err(ApprovalError::action_not_allowed(format!(
            "{} is not available in a {} stage",
            action, stage_type
        )));
    }
    Ok(())
}

/// Status of an application sitting in `to`
fn status_for(to: &ApplicationState) -> ApplicationStatus {
    if to.is_stage_type(StageType::Finished) {
        ApplicationStatus::Completed
    } else if to.is_draft() {
        ApplicationStatus::Draft
    } else {
        ApplicationStatus::InProgress
    }
}

/// Transition that keeps the position and only changes the status
fn stay(from: &ApplicationState, status: ApplicationStatus, lead: Vec<ActivityType>) -> Transition {
    Transition {
        from: *from,
        to: *from,
        status,
        activities: lead,
    }
}

/// Transition to another state, collecting exit and entry activities
fn move_to(
    graph: &VersionGraph,
    from: &ApplicationState,
    to: ApplicationState,
    lead: Vec<ActivityType>,
) -> Result<Transition, ApprovalError> {
    let mut activities = lead;
    if *from != to {
        activities.extend(graph.state_manager(from.stage_id())?.on_state_exit(from, &to));
        activities.extend(graph.state_manager(to.stage_id())?.on_state_entry(Some(from), &to));
    }

    Ok(Transition {
        from: *from,
        to,
        status: status_for(&to),
        activities,
    })
}

/// Resolves where an application goes when an action leaves `node`.
///
/// An interaction configured for the action overrides the stage type's
/// default forward target.
fn leave_stage(
    graph: &VersionGraph,
    node: &StageNode,
    from: &ApplicationState,
    action: ActionType,
    forward: impl FnOnce() -> Result<ApplicationState, ApprovalError>,
) -> Result<ApplicationState, ApprovalError> {
    let transition = node
        .interaction_for(action)
        .map(|i| i.transition())
        .unwrap_or(InteractionTransition::Next);

    match transition {
        InteractionTransition::Next => forward(),
        InteractionTransition::Previous => {
            let previous = graph.previous_stage(node.id()).ok_or_else(|| {
                ApprovalError::invalid_transition(format!(
                    "Stage '{}' has no previous stage",
                    node.stage().name()
                ))
            })?;
            graph.initial_state(previous.id())
        }
        InteractionTransition::Reset => graph.initial_state(node.id()),
        InteractionTransition::Stay => Ok(ApplicationState::new(
            from.stage_id(),
            from.stage_type(),
            from.approval_level_id(),
            false,
        )),
        InteractionTransition::ToStage(target) => {
            if graph.get(target).is_none() {
                return Err(ApprovalError::invalid_transition(format!(
                    "Interaction target stage {} is not part of this workflow version",
                    target
                )));
            }
            graph.initial_state(target)
        }
    }
}

/// Stage-level entry activities shared by the stage types without levels
fn stage_entry(from: Option<&ApplicationState>, to: &ApplicationState) -> Vec<ActivityType> {
    match from {
        Some(from) if from.is_same_stage(to) => Vec::new(),
        _ => vec![ActivityType::StageStarted],
    }
}

/// Stage-level exit activities shared by the stage types without levels
fn stage_exit(from: &ApplicationState, to: &ApplicationState) -> Vec<ActivityType> {
    if from.is_same_stage(to) {
        Vec::new()
    } else {
        vec![ActivityType::StageEnded]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::graph::fixtures::graph;

    #[test]
    fn test_manager_matches_stage_type() {
        let graph = graph(&[
            (StageType::FormSubmission, 0),
            (StageType::Approvals, 1),
            (StageType::Finished, 0),
        ]);

        let manager = graph.state_manager(StageId::new(2)).unwrap();
        assert_eq!(manager.stage().stage_type(), StageType::Approvals);

        let err = StageType::Waiting
            .state_manager(&graph, StageId::new(1))
            .err()
            .unwrap();
        assert_eq!(
            err,
            ApprovalError::undefined_stage_type("Application stage is not of type WAITING")
        );
    }

    #[test]
    fn test_unavailable_action_leaves_state_unchanged() {
        let graph = graph(&[
            (StageType::FormSubmission, 0),
            (StageType::Approvals, 2),
            (StageType::Waiting, 0),
            (StageType::Finished, 0),
        ]);

        for node in graph.stages() {
            let manager = graph.state_manager(node.id()).unwrap();
            let state = manager.initial_state();
            for action in ActionType::ALL {
                if node.stage_type().allows(action) {
                    continue;
                }
                let err = manager.transition(&state, action).unwrap_err();
                if node.stage_type().is_terminal() {
                    assert!(matches!(err, ApprovalError::InvalidTransition(_)));
                } else {
                    assert!(matches!(err, ApprovalError::ActionNotAllowed(_)));
                }
                assert_eq!(manager.initial_state(), state);
            }
        }
    }

    #[test]
    fn test_progress_only_from_waiting() {
        let graph = graph(&[(StageType::FormSubmission, 0), (StageType::Finished, 0)]);
        let manager = graph.state_manager(StageId::new(1)).unwrap();
        let err = manager.progress(&manager.initial_state()).unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition(_)));
    }
}
