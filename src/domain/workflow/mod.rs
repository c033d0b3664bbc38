//! Workflow domain module
//!
//! A workflow is a versioned approval process template. Each version is an
//! ordered list of stages; the stage type decides which actions an application
//! may take there and where each action leads.
//!
//! ## Stage types
//!
//! | type | code | actions |
//! |---|---|---|
//! | `FORM_SUBMISSION` | 10 | submit, withdraw before submission |
//! | `APPROVALS` | 20 | approve, reject, withdraw, reset approvals |
//! | `WAITING` | 25 | withdraw |
//! | `FINISHED` | 30 | none |

mod entity;
pub mod error;
pub mod graph;
mod stage;
mod stage_type;
pub mod state_manager;

pub use entity::{
    validate_id_number, validate_workflow_name, VersionStatus, Workflow, WorkflowVersion,
    MAX_ID_NUMBER_LENGTH, MAX_NAME_LENGTH,
};
pub use error::{ApprovalError, RejectionKind};
pub use graph::{StageNode, VersionGraph};
pub use stage::{
    ApprovalLevel, Formview, FormviewVisibility, Interaction, InteractionTransition, WorkflowStage,
};
pub use stage_type::{StageFeature, StageType};
pub use state_manager::StateManager;
