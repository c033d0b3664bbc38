//! Assignment domain module

mod approver;
mod assignment_type;
mod directory;
mod entity;

pub use approver::AssignmentApprover;
pub use assignment_type::{AssignmentTarget, AssignmentType, UntitledLabels};
pub use directory::{resolve_target, AssignmentDirectory, DirectoryEntry};
pub use entity::{Assignment, AssignmentStatus};

#[cfg(test)]
pub use directory::MockAssignmentDirectory;
