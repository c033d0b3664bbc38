//! Application domain module
//!
//! An application is one user's run through a published workflow version.
//! Its position is an [`ApplicationState`]; every user action is appended as
//! an immutable [`ApplicationAction`], and the form data submitted at each
//! stage is kept as an [`ApplicationSubmission`].

mod action;
mod activity;
mod entity;
mod state;
mod submission;

pub use action::{ActionType, ApplicationAction};
pub use activity::ActivityType;
pub use entity::Application;
pub use state::{ApplicationState, ApplicationStatus, Transition};
pub use submission::ApplicationSubmission;
