//! Directory of organisations, positions and cohorts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::assignment_type::{AssignmentTarget, AssignmentType, UntitledLabels};
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Raw record of an external entity as the directory stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id_number: String,
}

/// Lookup of the entities an assignment can target
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssignmentDirectory: Send + Sync {
    /// Finds one entity of a type
    async fn find(
        &self,
        assignment_type: AssignmentType,
        id: i64,
    ) -> Result<Option<DirectoryEntry>, DomainError>;
}

/// Loads an entity and adapts it to its assignment type
pub async fn resolve_target(
    directory: &dyn AssignmentDirectory,
    labels: &UntitledLabels,
    assignment_type: AssignmentType,
    id: i64,
) -> Result<AssignmentTarget, DomainError> {
    let entry = directory.find(assignment_type, id).await?.ok_or_else(|| {
        DomainError::not_found(format!("{} {} not found", assignment_type, id))
    })?;
    Ok(AssignmentTarget::from_entry(assignment_type, &entry, labels))
}
