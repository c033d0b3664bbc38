use super::{
    ensure_action_available, ensure_stage_type, leave_stage, move_to, stay, StateManager,
};
use crate::domain::application::{
    ActionType, ActivityType, ApplicationState, ApplicationStatus, Transition,
};
use crate::domain::ids::ApprovalLevelId;
use crate::domain::workflow::error::ApprovalError;
use crate::domain::workflow::graph::{StageNode, VersionGraph};
use crate::domain::workflow::stage_type::StageType;

/// Stage where approvers sign off level by level
pub struct ApprovalsStateManager<'g> {
    graph: &'g VersionGraph,
    node: &'g StageNode,
}

impl<'g> ApprovalsStateManager<'g> {
    pub fn new(graph: &'g VersionGraph, node: &'g StageNode) -> Result<Self, ApprovalError> {
        ensure_stage_type(node, StageType::Approvals)?;
        Ok(Self { graph, node })
    }

    fn level_state(&self, level_id: Option<ApprovalLevelId>) -> ApplicationState {
        ApplicationState::new(self.node.id(), StageType::Approvals, level_id, false)
    }

    /// Initial state of the stage after this one
    fn next_stage_state(&self) -> Result<ApplicationState, ApprovalError> {
        let next = self.graph.next_stage(self.node.id()).ok_or_else(|| {
            ApprovalError::invalid_transition(format!(
                "Approvals stage '{}' is not followed by another stage",
                self.node.stage().name()
            ))
        })?;
        self.graph.initial_state(next.id())
    }

    /// Current approval level, which must belong to this stage
    fn current_level(&self, current: &ApplicationState) -> Result<ApprovalLevelId, ApprovalError> {
        current
            .approval_level_id()
            .filter(|id| self.node.has_level(*id))
            .ok_or_else(|| {
                ApprovalError::invalid_transition(format!(
                    "Application is not at an approval level of stage '{}'",
                    self.node.stage().name()
                ))
            })
    }
}

impl StateManager for ApprovalsStateManager<'_> {
    fn stage(&self) -> &StageNode {
        self.node
    }

    fn creation_state(&self) -> Result<ApplicationState, ApprovalError> {
        Err(ApprovalError::invalid_transition(
            "An application can not start in an approval stage",
        ))
    }

    fn initial_state(&self) -> ApplicationState {
        self.level_state(self.node.first_level().map(|l| l.id()))
    }

    fn next_state(&self, current: &ApplicationState) -> Result<ApplicationState, ApprovalError> {
        let next_level = current
            .approval_level_id()
            .and_then(|id| self.node.level_after(id));

        match next_level {
            Some(level) => Ok(self.level_state(Some(level.id()))),
            None => self.next_stage_state(),
        }
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
            ActionType::Approve => {
                let level_id = self.current_level(current)?;
                match self.node.level_after(level_id) {
                    Some(next) => move_to(
                        self.graph,
                        current,
                        self.level_state(Some(next.id())),
                        vec![ActivityType::LevelApproved],
                    ),
                    None => {
                        let to = leave_stage(self.graph, self.node, current, action, || {
                            self.next_stage_state()
                        })?;
                        move_to(
                            self.graph,
                            current,
                            to,
                            vec![ActivityType::LevelApproved, ActivityType::StageAllApproved],
                        )
                    }
                }
            }
            ActionType::Reject => {
                self.current_level(current)?;
                Ok(stay(
                    current,
                    ApplicationStatus::Rejected,
                    vec![ActivityType::LevelRejected],
                ))
            }
            ActionType::ResetApprovals => {
                move_to(
                    self.graph,
                    current,
                    self.initial_state(),
                    vec![ActivityType::ApprovalsReset],
                )
            }
            _ => Ok(stay(
                current,
                ApplicationStatus::Withdrawn,
                vec![ActivityType::Withdrawn],
            )),
        }
    }

    fn on_state_entry(&self, from: Option<&ApplicationState>, to: &ApplicationState) -> Vec<ActivityType> {
        match from {
            Some(from) if from.is_same_stage(to) => {
                if from.approval_level_id() != to.approval_level_id() {
                    vec![ActivityType::LevelStarted]
                } else {
                    Vec::new()
                }
            }
            _ => vec![ActivityType::StageStarted, ActivityType::LevelStarted],
        }
    }

    fn on_state_exit(&self, from: &ApplicationState, to: &ApplicationState) -> Vec<ActivityType> {
        if !from.is_same_stage(to) {
            vec![ActivityType::LevelEnded, ActivityType::StageEnded]
        } else if from.approval_level_id() != to.approval_level_id() {
            vec![ActivityType::LevelEnded]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::StageId;
    use crate::domain::workflow::graph::fixtures::graph;

    fn reference() -> VersionGraph {
        graph(&[
            (StageType::FormSubmission, 0),
            (StageType::Approvals, 2),
            (StageType::Finished, 0),
        ])
    }

    fn at_level(level: i64) -> ApplicationState {
        ApplicationState::new(
            StageId::new(2),
            StageType::Approvals,
            Some(ApprovalLevelId::new(level)),
            false,
        )
    }

    #[test]
    fn test_creation_state_fails() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();
        assert_eq!(
            manager.creation_state().unwrap_err().to_string(),
            "Invalid transition: An application can not start in an approval stage"
        );
    }

    #[test]
    fn test_initial_state_is_first_level() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();
        assert_eq!(manager.initial_state(), at_level(201));
    }

    #[test]
    fn test_next_state() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        assert_eq!(manager.next_state(&at_level(201)).unwrap(), at_level(202));
        let after_last = manager.next_state(&at_level(202)).unwrap();
        assert_eq!(after_last.stage_id(), StageId::new(3));
        assert_eq!(
            manager.previous_state(&at_level(202)).unwrap().stage_id(),
            StageId::new(1)
        );
    }

    #[test]
    fn test_approve_advances_one_level() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        let transition = manager.transition(&at_level(201), ActionType::Approve).unwrap();
        assert_eq!(transition.to, at_level(202));
        assert_eq!(transition.status, ApplicationStatus::InProgress);
        assert_eq!(
            transition.activities,
            vec![
                ActivityType::LevelApproved,
                ActivityType::LevelEnded,
                ActivityType::LevelStarted,
            ]
        );
    }

    #[test]
    fn test_approve_last_level_finishes() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        let transition = manager.transition(&at_level(202), ActionType::Approve).unwrap();
        assert_eq!(transition.to.stage_id(), StageId::new(3));
        assert!(transition.to.approval_level_id().is_none());
        assert_eq!(transition.status, ApplicationStatus::Completed);
        assert_eq!(
            transition.activities,
            vec![
                ActivityType::LevelApproved,
                ActivityType::StageAllApproved,
                ActivityType::LevelEnded,
                ActivityType::StageEnded,
                ActivityType::StageStarted,
                ActivityType::Finished,
            ]
        );
    }

    #[test]
    fn test_approve_last_level_moves_to_next_approvals_stage() {
        let graph = graph(&[
            (StageType::FormSubmission, 0),
            (StageType::Approvals, 1),
            (StageType::Approvals, 1),
            (StageType::Finished, 0),
        ]);
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        let transition = manager.transition(&at_level(201), ActionType::Approve).unwrap();
        assert_eq!(transition.to.stage_id(), StageId::new(3));
        assert_eq!(transition.to.approval_level_id(), Some(ApprovalLevelId::new(301)));
        assert_eq!(transition.status, ApplicationStatus::InProgress);
    }

    #[test]
    fn test_reject_keeps_pointers() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        for level in [201, 202] {
            let transition = manager.transition(&at_level(level), ActionType::Reject).unwrap();
            assert_eq!(transition.to, at_level(level));
            assert_eq!(transition.status, ApplicationStatus::Rejected);
            assert_eq!(transition.activities, vec![ActivityType::LevelRejected]);
        }
    }

    #[test]
    fn test_reset_returns_to_first_level() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        let transition = manager
            .transition(&at_level(202), ActionType::ResetApprovals)
            .unwrap();
        assert_eq!(transition.to, at_level(201));
        assert_eq!(
            transition.activities,
            vec![
                ActivityType::ApprovalsReset,
                ActivityType::LevelEnded,
                ActivityType::LevelStarted,
            ]
        );

        let transition = manager
            .transition(&at_level(201), ActionType::ResetApprovals)
            .unwrap();
        assert_eq!(transition.activities, vec![ActivityType::ApprovalsReset]);
    }

    #[test]
    fn test_withdraw() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        let transition = manager
            .transition(&at_level(201), ActionType::WithdrawInApprovals)
            .unwrap();
        assert_eq!(transition.status, ApplicationStatus::Withdrawn);
        assert_eq!(transition.to, at_level(201));
    }

    #[test]
    fn test_approve_at_foreign_level_fails() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();

        let err = manager.transition(&at_level(999), ActionType::Approve).unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition(_)));
    }

    #[test]
    fn test_entry_and_exit_activities() {
        let graph = reference();
        let manager = graph.state_manager(StageId::new(2)).unwrap();
        let form = graph.initial_state(StageId::new(1)).unwrap();
        let finished = graph.initial_state(StageId::new(3)).unwrap();

        assert_eq!(
            manager.on_state_entry(Some(&form), &at_level(201)),
            vec![ActivityType::StageStarted, ActivityType::LevelStarted]
        );
        assert_eq!(
            manager.on_state_entry(Some(&at_level(201)), &at_level(202)),
            vec![ActivityType::LevelStarted]
        );
        assert_eq!(
            manager.on_state_exit(&at_level(202), &finished),
            vec![ActivityType::LevelEnded, ActivityType::StageEnded]
        );
        assert_eq!(
            manager.on_state_exit(&at_level(201), &at_level(202)),
            vec![ActivityType::LevelEnded]
        );
    }
}
