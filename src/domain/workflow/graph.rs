//! In-memory view of one workflow version's stage graph

use std::collections::HashSet;

use super::error::ApprovalError;
use super::stage::{ApprovalLevel, Formview, Interaction, WorkflowStage};
use super::stage_type::StageType;
use crate::domain::application::ActionType;
use crate::domain::ids::{ApprovalLevelId, StageId, WorkflowVersionId};
use crate::domain::storage::StoreTransaction;
use crate::domain::DomainError;

/// A stage with its active approval levels and interactions, both in order
#[derive(Debug, Clone)]
pub struct StageNode {
    stage: WorkflowStage,
    levels: Vec<ApprovalLevel>,
    formviews: Vec<Formview>,
    interactions: Vec<Interaction>,
}

impl StageNode {
    pub fn id(&self) -> StageId {
        self.stage.id()
    }

    pub fn stage(&self) -> &WorkflowStage {
        &self.stage
    }

    pub fn stage_type(&self) -> StageType {
        self.stage.stage_type()
    }

    pub fn levels(&self) -> &[ApprovalLevel] {
        &self.levels
    }

    pub fn formviews(&self) -> &[Formview] {
        &self.formviews
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn first_level(&self) -> Option<&ApprovalLevel> {
        self.levels.first()
    }

    pub fn level_after(&self, level_id: ApprovalLevelId) -> Option<&ApprovalLevel> {
        let position = self.levels.iter().position(|l| l.id() == level_id)?;
        self.levels.get(position + 1)
    }

    pub fn has_level(&self, level_id: ApprovalLevelId) -> bool {
        self.levels.iter().any(|l| l.id() == level_id)
    }

    pub fn interaction_for(&self, action: ActionType) -> Option<&Interaction> {
        self.interactions.iter().find(|i| i.action() == action)
    }
}

/// Ordered stages of a workflow version
#[derive(Debug, Clone)]
pub struct VersionGraph {
    version_id: WorkflowVersionId,
    nodes: Vec<StageNode>,
}

impl VersionGraph {
    /// Builds the graph from loose records. Inactive rows and rows of other
    /// stages are ignored.
    pub fn from_parts(
        version_id: WorkflowVersionId,
        stages: Vec<WorkflowStage>,
        levels: Vec<ApprovalLevel>,
        formviews: Vec<Formview>,
        interactions: Vec<Interaction>,
    ) -> Self {
        let mut stages: Vec<WorkflowStage> = stages
            .into_iter()
            .filter(|s| s.workflow_version_id() == version_id && s.is_active())
            .collect();
        stages.sort_by_key(|s| (s.sort_order(), s.id()));

        let nodes = stages
            .into_iter()
            .map(|stage| {
                let mut stage_levels: Vec<ApprovalLevel> = levels
                    .iter()
                    .filter(|l| l.workflow_stage_id() == stage.id() && l.is_active())
                    .cloned()
                    .collect();
                stage_levels.sort_by_key(|l| (l.sort_order(), l.id()));

                let stage_formviews = formviews
                    .iter()
                    .filter(|f| f.workflow_stage_id() == stage.id())
                    .cloned()
                    .collect();

                let stage_interactions = interactions
                    .iter()
                    .filter(|i| i.workflow_stage_id() == stage.id())
                    .cloned()
                    .collect();

                StageNode {
                    stage,
                    levels: stage_levels,
                    formviews: stage_formviews,
                    interactions: stage_interactions,
                }
            })
            .collect();

        Self { version_id, nodes }
    }

    /// Loads the graph of a version through a transaction
    pub async fn load(
        tx: &dyn StoreTransaction,
        version_id: WorkflowVersionId,
    ) -> Result<Self, DomainError> {
        let stages = tx
            .stages()
            .find(&|s: &WorkflowStage| s.workflow_version_id() == version_id)
            .await?;
        let stage_ids: HashSet<StageId> = stages.iter().map(|s| s.id()).collect();

        let levels = tx
            .approval_levels()
            .find(&|l: &ApprovalLevel| stage_ids.contains(&l.workflow_stage_id()))
            .await?;
        let formviews = tx
            .formviews()
            .find(&|f: &Formview| stage_ids.contains(&f.workflow_stage_id()))
            .await?;
        let interactions = tx
            .interactions()
            .find(&|i: &Interaction| stage_ids.contains(&i.workflow_stage_id()))
            .await?;

        Ok(Self::from_parts(version_id, stages, levels, formviews, interactions))
    }

    pub fn version_id(&self) -> WorkflowVersionId {
        self.version_id
    }

    pub fn stages(&self) -> &[StageNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn position(&self, stage_id: StageId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == stage_id)
    }

    pub fn get(&self, stage_id: StageId) -> Option<&StageNode> {
        self.nodes.iter().find(|n| n.id() == stage_id)
    }

    /// Stage that must be part of this version
    pub fn node(&self, stage_id: StageId) -> Result<&StageNode, ApprovalError> {
        self.get(stage_id).ok_or_else(|| {
            DomainError::not_found(format!(
                "Stage {} is not part of workflow version {}",
                stage_id, self.version_id
            ))
            .into()
        })
    }

    pub fn first_stage(&self) -> Option<&StageNode> {
        self.nodes.first()
    }

    pub fn next_stage(&self, stage_id: StageId) -> Option<&StageNode> {
        self.nodes.get(self.position(stage_id)? + 1)
    }

    pub fn previous_stage(&self, stage_id: StageId) -> Option<&StageNode> {
        let position = self.position(stage_id)?;
        position.checked_sub(1).and_then(|p| self.nodes.get(p))
    }

    pub fn finished_stage(&self) -> Option<&StageNode> {
        self.nodes
            .iter()
            .find(|n| n.stage_type() == StageType::Finished)
    }

    /// First stage of a type after the given stage
    pub fn first_later_of_type(&self, stage_id: StageId, stage_type: StageType) -> Option<&StageNode> {
        let position = self.position(stage_id)?;
        self.nodes[position + 1..]
            .iter()
            .find(|n| n.stage_type() == stage_type)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::storage::StorageEntity;
    use crate::domain::workflow::InteractionTransition;

    /// Builds a graph from `(stage type, level count)` pairs. Stage ids are
    /// `1..`, level ids are `100 * stage id + n`.
    pub fn graph(shape: &[(StageType, usize)]) -> VersionGraph {
        let version_id = WorkflowVersionId::new(1);
        let mut stages = Vec::new();
        let mut levels = Vec::new();
        let mut interactions = Vec::new();

        for (index, (stage_type, level_count)) in shape.iter().enumerate() {
            let stage_id = StageId::new(index as i64 + 1);
            let mut stage =
                WorkflowStage::new(version_id, format!("Stage {}", index + 1), *stage_type, index as i32 + 1)
                    .expect("valid stage");
            stage.set_key(stage_id);
            stages.push(stage);

            for n in 0..*level_count {
                let mut level = ApprovalLevel::new(stage_id, format!("Level {}", n + 1), n as i32 + 1);
                level.set_key(ApprovalLevelId::new(stage_id.value() * 100 + n as i64 + 1));
                levels.push(level);
            }

            if *stage_type == StageType::Approvals {
                let mut reject =
                    Interaction::new(stage_id, ActionType::Reject, InteractionTransition::Stay);
                reject.set_key(crate::domain::ids::InteractionId::new(stage_id.value() * 10));
                interactions.push(reject);
            }
        }

        VersionGraph::from_parts(version_id, stages, levels, Vec::new(), interactions)
    }
}
