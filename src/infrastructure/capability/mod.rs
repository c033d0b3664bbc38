//! Capability checker implementations

mod grant_checker;

pub use grant_checker::GrantCapabilityChecker;
