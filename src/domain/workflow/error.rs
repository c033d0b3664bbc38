//! Approval engine error types

use serde::Serialize;
use thiserror::Error;

use crate::domain::DomainError;

/// Errors raised by the approval engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApprovalError {
    #[error("Undefined stage type: {0}")]
    UndefinedStageType(String),

    #[error("Undefined assignment type: {0}")]
    UndefinedAssignmentType(String),

    #[error("Action not allowed: {0}")]
    ActionNotAllowed(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Stale application state: {0}")]
    StaleApplicationState(String),

    #[error("Workflow clone failed: {0}")]
    CloneFailure(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Machine-readable kind of a recoverable rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    ActionNotAllowed,
    AccessDenied,
    InvalidTransition,
    StaleApplicationState,
}

impl RejectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ActionNotAllowed => "action_not_allowed",
            Self::AccessDenied => "access_denied",
            Self::InvalidTransition => "invalid_transition",
            Self::StaleApplicationState => "stale_application_state",
        }
    }
}

impl ApprovalError {
    pub fn undefined_stage_type(value: impl Into<String>) -> Self {
        Self::UndefinedStageType(value.into())
    }

    pub fn undefined_assignment_type(value: impl Into<String>) -> Self {
        Self::UndefinedAssignmentType(value.into())
    }

    pub fn action_not_allowed(message: impl Into<String>) -> Self {
        Self::ActionNotAllowed(message.into())
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition(message.into())
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleApplicationState(message.into())
    }

    pub fn clone_failure(message: impl Into<String>) -> Self {
        Self::CloneFailure(message.into())
    }

    /// Policy, authorization and concurrency errors. These are reported to the
    /// caller as a rejected request; everything else is a defect or an
    /// infrastructure failure.
    pub fn is_recoverable(&self) -> bool {
        self.rejection_kind().is_some()
    }

    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        match self {
            Self::ActionNotAllowed(_) => Some(RejectionKind::ActionNotAllowed),
            Self::AccessDenied(_) => Some(RejectionKind::AccessDenied),
            Self::InvalidTransition(_) => Some(RejectionKind::InvalidTransition),
            Self::StaleApplicationState(_) => Some(RejectionKind::StaleApplicationState),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApprovalError::undefined_stage_type("99");
        assert_eq!(err.to_string(), "Undefined stage type: 99");

        let err = ApprovalError::invalid_transition("An application can not start in an approval stage");
        assert_eq!(
            err.to_string(),
            "Invalid transition: An application can not start in an approval stage"
        );

        let err: ApprovalError = DomainError::not_found("application record 7 not found").into();
        assert_eq!(err.to_string(), "Not found: application record 7 not found");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ApprovalError::action_not_allowed("x").is_recoverable());
        assert!(ApprovalError::access_denied("x").is_recoverable());
        assert!(ApprovalError::invalid_transition("x").is_recoverable());
        assert!(ApprovalError::stale("x").is_recoverable());

        assert!(!ApprovalError::undefined_stage_type("x").is_recoverable());
        assert!(!ApprovalError::undefined_assignment_type("x").is_recoverable());
        assert!(!ApprovalError::clone_failure("x").is_recoverable());
        assert!(!ApprovalError::Domain(DomainError::internal("x")).is_recoverable());
    }

    #[test]
    fn test_rejection_kind_serialization() {
        let kind = ApprovalError::stale("x").rejection_kind().unwrap();
        assert_eq!(
            serde_json::to_string(&kind).unwrap(),
            "\"stale_application_state\""
        );
    }
}
