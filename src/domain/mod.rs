//! Domain layer - Core business logic and entities

pub mod application;
pub mod assignment;
pub mod capability;
pub mod context;
pub mod error;
pub mod ids;
pub mod notification;
pub mod storage;
pub mod workflow;

pub use application::{
    ActionType, ActivityType, Application, ApplicationAction, ApplicationState, ApplicationStatus,
    ApplicationSubmission, Transition,
};
pub use assignment::{
    Assignment, AssignmentApprover, AssignmentDirectory, AssignmentStatus, AssignmentTarget,
    AssignmentType, DirectoryEntry, UntitledLabels,
};
pub use capability::{Capability, CapabilityChecker, CapabilityScope};
pub use context::{Context, ExtendedContext};
pub use error::DomainError;
pub use ids::{
    ApplicationActionId, ApplicationId, ApplicationSubmissionId, ApprovalLevelId,
    AssignmentApproverId, AssignmentId, ContextId, FormviewId, InteractionId,
    NotifiableEventPreferenceId, NotificationPreferenceId, StageId, UserId, WorkflowId,
    WorkflowVersionId,
};
pub use notification::{
    DeliveryChannelResolver, EventSink, EventType, NotifiableEventPreference,
    NotificationPreference,
};
pub use storage::{ApprovalStore, Storage, StorageEntity, StorageKey, StoreTransaction};
pub use workflow::{
    ApprovalError, ApprovalLevel, Formview, FormviewVisibility, Interaction,
    InteractionTransition, RejectionKind, StageFeature, StageNode, StageType, StateManager,
    VersionGraph, VersionStatus, Workflow, WorkflowStage, WorkflowVersion,
};
