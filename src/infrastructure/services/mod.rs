//! Infrastructure services

mod application_service;
mod cloner;
mod support;
mod workflow_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use application_service::{
    ActionOutcome, ApplicationService, CreateApplicationRequest, CreatedApplication,
    RejectionReason,
};
pub use cloner::{CloneWorkflowRequest, WorkflowCloner};
pub use workflow_service::{
    create_category_context, AddApproverRequest, CreateWorkflowRequest, StageDetails,
    WorkflowDetails, WorkflowService, DEFAULT_LEVEL_NAME,
};
