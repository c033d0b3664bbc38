//! In-memory directory of organisations, positions and cohorts

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::assignment::{AssignmentDirectory, AssignmentType, DirectoryEntry};
use crate::domain::DomainError;

/// Directory kept in process memory, seeded at startup
#[derive(Debug, Default)]
pub struct InMemoryAssignmentDirectory {
    entries: RwLock<HashMap<(AssignmentType, i64), DirectoryEntry>>,
}

impl InMemoryAssignmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entity
    pub async fn add(&self, assignment_type: AssignmentType, entry: DirectoryEntry) {
        let mut entries = self.entries.write().await;
        entries.insert((assignment_type, entry.id), entry);
    }

    pub fn with_entry(mut self, assignment_type: AssignmentType, entry: DirectoryEntry) -> Self {
        self.entries
            .get_mut()
            .insert((assignment_type, entry.id), entry);
        self
    }
}

#[async_trait]
impl AssignmentDirectory for InMemoryAssignmentDirectory {
    async fn find(
        &self,
        assignment_type: AssignmentType,
        id: i64,
    ) -> Result<Option<DirectoryEntry>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(assignment_type, id)).cloned())
    }
}
