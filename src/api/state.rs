//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::services::{ApplicationService, WorkflowCloner, WorkflowService};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub workflows: Arc<WorkflowService>,
    pub applications: Arc<ApplicationService>,
    pub cloner: Arc<WorkflowCloner>,
}

impl AppState {
    pub fn new(
        workflows: WorkflowService,
        applications: ApplicationService,
        cloner: WorkflowCloner,
    ) -> Self {
        Self {
            workflows: Arc::new(workflows),
            applications: Arc::new(applications),
            cloner: Arc::new(cloner),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
