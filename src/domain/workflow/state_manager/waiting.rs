use super::{
    ensure_action_available, ensure_stage_type, move_to, stage_entry, stage_exit, stay,
    StateManager,
};
use crate::domain::application::{
    ActionType, ActivityType, ApplicationState, ApplicationStatus, Transition,
};
use crate::domain::workflow::error::ApprovalError;
use crate::domain::workflow::graph::{StageNode, VersionGraph};
use crate::domain::workflow::stage_type::StageType;

/// Stage held until something outside the application releases it
pub struct WaitingStateManager<'g> {
    graph: &'g VersionGraph,
    node: &'g StageNode,
}

impl<'g> WaitingStateManager<'g> {
    pub fn new(graph: &'g VersionGraph, node: &'g StageNode) -> Result<Self, ApprovalError> {
        ensure_stage_type(node, StageType::Waiting)?;
        Ok(Self { graph, node })
    }
}

impl StateManager for WaitingStateManager<'_> {
    fn stage(&self) -> &StageNode {
        self.node
    }

    fn creation_state(&self) -> Result<ApplicationState, ApprovalError> {
        Err(ApprovalError::invalid_transition(
            "An application can not start in a waiting stage",
        ))
    }

    fn initial_state(&self) -> ApplicationState {
        ApplicationState::new(self.node.id(), StageType::Waiting, None, false)
    }

    fn next_state(&self, _current: &ApplicationState) -> Result<ApplicationState, ApprovalError> {
        let next = self.graph.next_stage(self.node.id()).ok_or_else(|| {
            ApprovalError::invalid_transition(format!(
                "Waiting stage '{}' is not followed by another stage",
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
        Ok(stay(
            current,
            ApplicationStatus::Withdrawn,
            vec![ActivityType::for_action(action)],
        ))
    }

    fn progress(&self, current: &ApplicationState) -> Result<Transition, ApprovalError> {
        let to = self.next_state(current)?;
        move_to(self.graph, current, to, Vec::new())
    }

    fn on_state_entry(&self, from: Option<&ApplicationState>, to: &ApplicationState) -> Vec<ActivityType> {
        stage_entry(from, to)
    }

    fn on_state_exit(&self, from: &ApplicationState, to: &ApplicationState) -> Vec<ActivityType> {
        stage_exit(from, to)
    }
}
