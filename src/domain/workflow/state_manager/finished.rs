use super::{ensure_action_available, ensure_stage_type, StateManager};
use crate::domain::application::{ActionType, ActivityType, ApplicationState, Transition};
use crate::domain::workflow::error::ApprovalError;
use crate::domain::workflow::graph::{StageNode, VersionGraph};
use crate::domain::workflow::stage_type::StageType;

/// Terminal stage; accepts no action
pub struct FinishedStateManager<'g> {
    graph: &'g VersionGraph,
    node: &'g StageNode,
}

impl<'g> FinishedStateManager<'g> {
    pub fn new(graph: &'g VersionGraph, node: &'g StageNode) -> Result<Self, ApprovalError> {
        ensure_stage_type(node, StageType::Finished)?;
        Ok(Self { graph, node })
    }
}

impl StateManager for FinishedStateManager<'_> {
    fn stage(&self) -> &StageNode {
        self.node
    }

    fn creation_state(&self) -> Result<ApplicationState, ApprovalError> {
        Err(ApprovalError::invalid_transition(
            "An application can not start in a finished stage",
        ))
    }

    fn initial_state(&self) -> ApplicationState {
        ApplicationState::new(self.node.id(), StageType::Finished, None, false)
    }

    fn next_state(&self, _current: &ApplicationState) -> Result<ApplicationState, ApprovalError> {
        Err(ApprovalError::invalid_transition(
            "There is no state after the finished stage",
        ))
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
        _current: &ApplicationState,
        action: ActionType,
    ) -> Result<Transition, ApprovalError> {
        ensure_action_available(self.node, action)?;
        Err(ApprovalError::invalid_transition(format!(
            "{} can not be applied to a finished application",
            action
        )))
    }

    fn on_state_entry(&self, _from: Option<&ApplicationState>, _to: &ApplicationState) -> Vec<ActivityType> {
        vec![ActivityType::StageStarted, ActivityType::Finished]
    }

    fn on_state_exit(&self, _from: &ApplicationState, _to: &ApplicationState) -> Vec<ActivityType> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::StageId;
    use crate::domain::workflow::graph::fixtures::graph;

    #[test]
    fn test_every_action_is_invalid() {
        let graph = graph(&[(StageType::FormSubmission, 0), (StageType::Finished, 0)]);
        let manager = graph.state_manager(StageId::new(2)).unwrap();
        let state = manager.initial_state();

        for action in ActionType::ALL {
            let err = manager.transition(&state, action).unwrap_err();
            assert!(matches!(err, ApprovalError::InvalidTransition(_)));
        }
    }

    #[test]
    fn test_creation_and_next_state_fail() {
        let graph = graph(&[(StageType::FormSubmission, 0), (StageType::Finished, 0)]);
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        assert!(manager.creation_state().is_err());
        assert!(manager.next_state(&manager.initial_state()).is_err());
        assert_eq!(
            manager.previous_state(&manager.initial_state()).unwrap().stage_id(),
            StageId::new(1)
        );
    }

    #[test]
    fn test_entry_records_completion() {
        let graph = graph(&[(StageType::FormSubmission, 0), (StageType::Finished, 0)]);
        let manager = graph.state_manager(StageId::new(2)).unwrap();
        let state = manager.initial_state();

        assert_eq!(
            manager.on_state_entry(None, &state),
            vec![ActivityType::StageStarted, ActivityType::Finished]
        );
    }
}
