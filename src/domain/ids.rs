//! Integer record identifiers
//!
//! Every persisted record is keyed by a positive `i64`. The value `0` marks a
//! record that has not been stored yet; the store assigns the real id on insert.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageKey;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Placeholder id for records that have not been persisted yet
            pub const UNSAVED: Self = Self(0);

            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl StorageKey for $name {
            fn value(&self) -> i64 {
                self.0
            }

            fn from_value(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// Identifier of a workflow
    WorkflowId
);
record_id!(
    /// Identifier of a workflow version
    WorkflowVersionId
);
record_id!(
    /// Identifier of a workflow stage
    StageId
);
record_id!(
    /// Identifier of an approval level
    ApprovalLevelId
);
record_id!(FormviewId);
record_id!(InteractionId);
record_id!(
    /// Identifier of an assignment (workflow scope)
    AssignmentId
);
record_id!(
    /// Identifier of an application
    ApplicationId
);
record_id!(ApplicationActionId);
record_id!(
    /// Identifier of a stored form submission
    ApplicationSubmissionId
);
record_id!(AssignmentApproverId);
record_id!(
    /// Identifier of a permission context
    ContextId
);
record_id!(NotificationPreferenceId);
record_id!(NotifiableEventPreferenceId);
record_id!(
    /// Identifier of a user (applicant, approver, administrator)
    UserId
);
