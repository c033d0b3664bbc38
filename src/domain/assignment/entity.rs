//! Assignment entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assignment_type::{AssignmentTarget, AssignmentType};
use crate::domain::ids::{AssignmentId, WorkflowId};
use crate::domain::storage::StorageEntity;

/// Lifecycle status of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// Scope a workflow applies to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    id: AssignmentId,
    workflow_id: WorkflowId,
    assignment_type: AssignmentType,
    /// Id of the external organisation, position or cohort
    assignment_identifier: i64,
    name: String,
    id_number: String,
    is_default: bool,
    status: AssignmentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Assignment {
    /// New draft assignment of a workflow
    pub fn new(workflow_id: WorkflowId, target: &AssignmentTarget, is_default: bool) -> Self {
        let now = Utc::now();
        Self {
            id: AssignmentId::UNSAVED,
            workflow_id,
            assignment_type: target.assignment_type(),
            assignment_identifier: target.entity_id(),
            name: target.name().to_string(),
            id_number: target.id_number().to_string(),
            is_default,
            status: AssignmentStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> AssignmentId {
        self.id
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn assignment_type(&self) -> AssignmentType {
        self.assignment_type
    }

    pub fn assignment_identifier(&self) -> i64 {
        self.assignment_identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_number(&self) -> &str {
        &self.id_number
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn status(&self) -> AssignmentStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }

    pub fn activate(&mut self) {
        self.status = AssignmentStatus::Active;
        self.updated_at = Utc::now();
    }

    pub fn archive(&mut self) {
        self.status = AssignmentStatus::Archived;
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Assignment {
    type Key = AssignmentId;
    const TABLE: &'static str = "assignment";

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
    use crate::domain::assignment::{DirectoryEntry, UntitledLabels};

    #[test]
    fn test_default_assignment_lifecycle() {
        let entry = DirectoryEntry {
            id: 42,
            name: String::new(),
            id_number: String::new(),
        };
        let target = AssignmentTarget::from_entry(AssignmentType::Cohort, &entry, &UntitledLabels::default());
        let mut assignment = Assignment::new(WorkflowId::new(1), &target, true);

        assert_eq!(assignment.status(), AssignmentStatus::Draft);
        assert_eq!(assignment.id_number(), "COHORT_42");
        assert_eq!(assignment.assignment_identifier(), 42);
        assert!(assignment.is_default());

        assignment.activate();
        assert!(assignment.is_active());
        assignment.archive();
        assert_eq!(assignment.status(), AssignmentStatus::Archived);
    }
}
