//! Stage type registry
//!
//! A closed set of stage behaviours. Each variant knows its persisted code, its
//! enum name, the features an author may configure on it and the actions an
//! application may take while sitting in it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ApprovalError;
use crate::domain::application::ActionType;

/// Feature that can be configured on a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFeature {
    Formviews,
    Interactions,
    ApprovalLevels,
}

/// Behavioural type of a workflow stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    FormSubmission,
    Approvals,
    Waiting,
    Finished,
}

impl StageType {
    /// Every registered stage type, by sort order
    pub const ALL: [StageType; 4] = [
        StageType::FormSubmission,
        StageType::Approvals,
        StageType::Waiting,
        StageType::Finished,
    ];

    pub fn from_code(code: i32) -> Result<Self, ApprovalError> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| ApprovalError::undefined_stage_type(code.to_string()))
    }

    pub fn from_enum(name: &str) -> Result<Self, ApprovalError> {
        Self::ALL
            .into_iter()
            .find(|t| t.enum_name() == name)
            .ok_or_else(|| ApprovalError::undefined_stage_type(name))
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::FormSubmission => 10,
            Self::Approvals => 20,
            Self::Waiting => 25,
            Self::Finished => 30,
        }
    }

    pub fn enum_name(&self) -> &'static str {
        match self {
            Self::FormSubmission => "FORM_SUBMISSION",
            Self::Approvals => "APPROVALS",
            Self::Waiting => "WAITING",
            Self::Finished => "FINISHED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FormSubmission => "Form submission",
            Self::Approvals => "Approvals",
            Self::Waiting => "Waiting",
            Self::Finished => "Finished",
        }
    }

    pub fn sort_order(&self) -> i32 {
        self.code()
    }

    pub fn configured_features(&self) -> &'static [StageFeature] {
        match self {
            Self::FormSubmission | Self::Waiting => {
                &[StageFeature::Formviews, StageFeature::Interactions]
            }
            Self::Approvals => &[
                StageFeature::Formviews,
                StageFeature::Interactions,
                StageFeature::ApprovalLevels,
            ],
            Self::Finished => &[],
        }
    }

    pub fn available_actions(&self) -> &'static [ActionType] {
        match self {
            Self::FormSubmission => &[ActionType::Submit, ActionType::WithdrawBeforeSubmission],
            Self::Approvals => &[
                ActionType::Approve,
                ActionType::Reject,
                ActionType::WithdrawInApprovals,
                ActionType::ResetApprovals,
            ],
            Self::Waiting => &[ActionType::WithdrawInApprovals],
            Self::Finished => &[],
        }
    }

    pub fn has_feature(&self, feature: StageFeature) -> bool {
        self.configured_features().contains(&feature)
    }

    pub fn allows(&self, action: ActionType) -> bool {
        self.available_actions().contains(&action)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.enum_name())
    }
}

impl FromStr for StageType {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_enum(s)
    }
}
