//! Workflow and workflow version entities

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ContextId, WorkflowId, WorkflowVersionId};
use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

/// Maximum length for workflow names
pub const MAX_NAME_LENGTH: usize = 1024;

/// Maximum length for workflow id-numbers
pub const MAX_ID_NUMBER_LENGTH: usize = 100;

/// Id-numbers are external references: printable, no surrounding whitespace
static ID_NUMBER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\S(?:[^\x00-\x1f]*\S)?$").ok());

/// Validate a workflow name (already trimmed)
pub fn validate_workflow_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::validation("Workflow name cannot be empty"));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::validation(format!(
            "Workflow name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }

    Ok(())
}

/// Validate a workflow id-number (already trimmed)
pub fn validate_id_number(id_number: &str) -> Result<(), DomainError> {
    if id_number.is_empty() {
        return Err(DomainError::validation("Workflow id_number cannot be empty"));
    }

    if id_number.len() > MAX_ID_NUMBER_LENGTH {
        return Err(DomainError::validation(format!(
            "Workflow id_number exceeds maximum length of {} characters",
            MAX_ID_NUMBER_LENGTH
        )));
    }

    if !ID_NUMBER_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(id_number))
    {
        return Err(DomainError::validation(format!(
            "Invalid workflow id_number '{}'",
            id_number
        )));
    }

    Ok(())
}

/// A named, versioned approval process template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    #[serde(default)]
    description: String,
    id_number: String,
    /// Name of the workflow type (e.g. "Travel request")
    workflow_type: String,
    context_id: ContextId,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new, not yet persisted workflow
    pub fn new(
        name: impl Into<String>,
        workflow_type: impl Into<String>,
        context_id: ContextId,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        validate_workflow_name(&name)?;
        let now = Utc::now();

        Ok(Self {
            id: WorkflowId::UNSAVED,
            name,
            description: String::new(),
            id_number: String::new(),
            workflow_type: workflow_type.into(),
            context_id,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into().trim().to_string();
        self
    }

    pub fn with_id_number(mut self, id_number: impl Into<String>) -> Self {
        self.id_number = id_number.into().trim().to_string();
        self
    }

    // Getters

    pub fn id(&self) -> WorkflowId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn id_number(&self) -> &str {
        &self.id_number
    }

    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    pub fn set_id_number(&mut self, id_number: impl Into<String>) -> Result<(), DomainError> {
        let id_number = id_number.into().trim().to_string();
        validate_id_number(&id_number)?;
        self.id_number = id_number;
        self.touch();
        Ok(())
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Workflow {
    type Key = WorkflowId;
    const TABLE: &'static str = "workflow";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}

/// Lifecycle status of a workflow version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// One snapshot of a workflow's stage graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVersion {
    id: WorkflowVersionId,
    workflow_id: WorkflowId,
    status: VersionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowVersion {
    /// Create a new draft version for a workflow
    pub fn new(workflow_id: WorkflowId) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowVersionId::UNSAVED,
            workflow_id,
            status: VersionStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> WorkflowVersionId {
        self.id
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn status(&self) -> VersionStatus {
        self.status
    }

    pub fn is_draft(&self) -> bool {
        self.status == VersionStatus::Draft
    }

    pub fn is_active(&self) -> bool {
        self.status == VersionStatus::Active
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Publish a draft version
    pub fn activate(&mut self) -> Result<(), DomainError> {
        if self.status != VersionStatus::Draft {
            return Err(DomainError::validation(format!(
                "Cannot activate workflow version {} because it is {}",
                self.id, self.status
            )));
        }
        self.status = VersionStatus::Active;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = VersionStatus::Archived;
        self.updated_at = Utc::now();
    }

    /// Put an archived version back into service
    pub fn restore(&mut self) {
        self.status = VersionStatus::Active;
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for WorkflowVersion {
    type Key = WorkflowVersionId;
    const TABLE: &'static str = "workflow_version";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}
