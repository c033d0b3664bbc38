//! Infrastructure layer - adapters behind the domain traits

pub mod assignment;
pub mod capability;
pub mod logging;
pub mod notification;
pub mod observability;
pub mod services;
pub mod storage;
