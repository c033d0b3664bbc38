//! Workflow stage and the records a stage owns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage_type::StageType;
use crate::domain::application::ActionType;
use crate::domain::ids::{
    ApprovalLevelId, FormviewId, InteractionId, StageId, WorkflowVersionId,
};
use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

/// A phase of an application's lifecycle with a behavioural type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStage {
    id: StageId,
    workflow_version_id: WorkflowVersionId,
    name: String,
    stage_type: StageType,
    /// 1-based position within the version
    sort_order: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowStage {
    pub fn new(
        workflow_version_id: WorkflowVersionId,
        name: impl Into<String>,
        stage_type: StageType,
        sort_order: i32,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Stage name cannot be empty"));
        }
        let now = Utc::now();

        Ok(Self {
            id: StageId::UNSAVED,
            workflow_version_id,
            name,
            stage_type,
            sort_order,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Copy of this stage for another version, not yet persisted
    pub fn clone_into(&self, workflow_version_id: WorkflowVersionId) -> Self {
        let now = Utc::now();
        Self {
            id: StageId::UNSAVED,
            workflow_version_id,
            name: self.name.clone(),
            stage_type: self.stage_type,
            sort_order: self.sort_order,
            active: self.active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn workflow_version_id(&self) -> WorkflowVersionId {
        self.workflow_version_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_type(&self) -> StageType {
        self.stage_type
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Stage name cannot be empty"));
        }
        self.name = name;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_sort_order(&mut self, sort_order: i32) {
        self.sort_order = sort_order;
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for WorkflowStage {
    type Key = StageId;
    const TABLE: &'static str = "workflow_stage";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }

    fn ordering_slot(&self) -> Option<(i64, i32)> {
        Some((self.workflow_version_id.value(), self.sort_order))
    }
}

/// An ordered sub-step of an approvals stage requiring sign-off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalLevel {
    id: ApprovalLevelId,
    workflow_stage_id: StageId,
    name: String,
    sort_order: i32,
    active: bool,
}

impl ApprovalLevel {
    pub fn new(workflow_stage_id: StageId, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id: ApprovalLevelId::UNSAVED,
            workflow_stage_id,
            name: name.into(),
            sort_order,
            active: true,
        }
    }

    pub fn clone_into(&self, workflow_stage_id: StageId) -> Self {
        Self {
            id: ApprovalLevelId::UNSAVED,
            workflow_stage_id,
            name: self.name.clone(),
            sort_order: self.sort_order,
            active: self.active,
        }
    }

    pub fn id(&self) -> ApprovalLevelId {
        self.id
    }

    pub fn workflow_stage_id(&self) -> StageId {
        self.workflow_stage_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_sort_order(&mut self, sort_order: i32) {
        self.sort_order = sort_order;
    }
}

impl StorageEntity for ApprovalLevel {
    type Key = ApprovalLevelId;
    const TABLE: &'static str = "workflow_stage_approval_level";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }

    fn ordering_slot(&self) -> Option<(i64, i32)> {
        Some((self.workflow_stage_id.value(), self.sort_order))
    }
}

/// How a form field is presented at a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormviewVisibility {
    #[default]
    Editable,
    EditableAndRequired,
    ReadOnly,
    Hidden,
}

/// Per-stage view configuration of one form field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formview {
    id: FormviewId,
    workflow_stage_id: StageId,
    field_key: String,
    visibility: FormviewVisibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    active: bool,
}

impl Formview {
    pub fn new(
        workflow_stage_id: StageId,
        field_key: impl Into<String>,
        visibility: FormviewVisibility,
    ) -> Self {
        Self {
            id: FormviewId::UNSAVED,
            workflow_stage_id,
            field_key: field_key.into(),
            visibility,
            default_value: None,
            active: true,
        }
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn clone_into(&self, workflow_stage_id: StageId) -> Self {
        Self {
            id: FormviewId::UNSAVED,
            workflow_stage_id,
            ..self.clone()
        }
    }

    pub fn id(&self) -> FormviewId {
        self.id
    }

    pub fn workflow_stage_id(&self) -> StageId {
        self.workflow_stage_id
    }

    pub fn field_key(&self) -> &str {
        &self.field_key
    }

    pub fn visibility(&self) -> FormviewVisibility {
        self.visibility
    }

    pub fn is_required(&self) -> bool {
        self.visibility == FormviewVisibility::EditableAndRequired
    }

    pub fn is_disabled(&self) -> bool {
        matches!(
            self.visibility,
            FormviewVisibility::ReadOnly | FormviewVisibility::Hidden
        )
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }
}

impl StorageEntity for Formview {
    type Key = FormviewId;
    const TABLE: &'static str = "workflow_stage_formview";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}

/// Where an interaction sends the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "stage_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionTransition {
    Next,
    Previous,
    Reset,
    Stay,
    ToStage(StageId),
}

/// Binding of an action to its transition at a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    id: InteractionId,
    workflow_stage_id: StageId,
    action: ActionType,
    transition: InteractionTransition,
}

impl Interaction {
    pub fn new(
        workflow_stage_id: StageId,
        action: ActionType,
        transition: InteractionTransition,
    ) -> Self {
        Self {
            id: InteractionId::UNSAVED,
            workflow_stage_id,
            action,
            transition,
        }
    }

    /// Copy for another stage; `TO_STAGE` targets are rewritten through `map_stage`
    pub fn clone_into(
        &self,
        workflow_stage_id: StageId,
        map_stage: impl Fn(StageId) -> Option<StageId>,
    ) -> Result<Self, DomainError> {
        let transition = match self.transition {
            InteractionTransition::ToStage(target) => {
                let mapped = map_stage(target).ok_or_else(|| {
                    DomainError::internal(format!(
                        "Interaction {} targets stage {} outside the cloned version",
                        self.id, target
                    ))
                })?;
                InteractionTransition::ToStage(mapped)
            }
            other => other,
        };

        Ok(Self {
            id: InteractionId::UNSAVED,
            workflow_stage_id,
            action: self.action,
            transition,
        })
    }

    pub fn id(&self) -> InteractionId {
        self.id
    }

    pub fn workflow_stage_id(&self) -> StageId {
        self.workflow_stage_id
    }

    pub fn action(&self) -> ActionType {
        self.action
    }

    pub fn transition(&self) -> InteractionTransition {
        self.transition
    }
}

impl StorageEntity for Interaction {
    type Key = InteractionId;
    const TABLE: &'static str = "workflow_stage_interaction";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::StorageKey;

    #[test]
    fn test_stage_requires_name() {
        let result = WorkflowStage::new(WorkflowVersionId::new(1), " ", StageType::Approvals, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_ordering_slot() {
        let stage =
            WorkflowStage::new(WorkflowVersionId::new(5), "Review", StageType::Approvals, 2).unwrap();
        assert_eq!(stage.ordering_slot(), Some((5, 2)));
    }

    #[test]
    fn test_stage_clone_into_resets_id() {
        let mut stage =
            WorkflowStage::new(WorkflowVersionId::new(5), "Review", StageType::Approvals, 2).unwrap();
        stage.set_key(StageId::new(11));

        let copy = stage.clone_into(WorkflowVersionId::new(8));
        assert!(copy.id().is_new());
        assert_eq!(copy.workflow_version_id(), WorkflowVersionId::new(8));
        assert_eq!(copy.name(), "Review");
        assert_eq!(copy.sort_order(), 2);
    }

    #[test]
    fn test_interaction_clone_rewrites_target() {
        let interaction = Interaction::new(
            StageId::new(1),
            ActionType::Reject,
            InteractionTransition::ToStage(StageId::new(3)),
        );

        let copy = interaction
            .clone_into(StageId::new(10), |old| (old == StageId::new(3)).then(|| StageId::new(30)))
            .unwrap();
        assert_eq!(copy.transition(), InteractionTransition::ToStage(StageId::new(30)));
        assert_eq!(copy.workflow_stage_id(), StageId::new(10));

        let unmapped = interaction.clone_into(StageId::new(10), |_| None);
        assert!(unmapped.is_err());
    }

    #[test]
    fn test_formview_required() {
        let formview =
            Formview::new(StageId::new(1), "reason", FormviewVisibility::EditableAndRequired);
        assert!(formview.is_required());
        assert!(formview.default_value().is_none());
    }

    #[test]
    fn test_transition_serialization() {
        let json = serde_json::to_value(InteractionTransition::ToStage(StageId::new(4))).unwrap();
        assert_eq!(json, serde_json::json!({"type": "TO_STAGE", "stage_id": 4}));

        let json = serde_json::to_value(InteractionTransition::Next).unwrap();
        assert_eq!(json, serde_json::json!({"type": "NEXT"}));
    }
}
