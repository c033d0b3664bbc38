//! Persistence boundary
//!
//! All engine operations run against a [`StoreTransaction`] obtained from an
//! [`ApprovalStore`]. Writes are only visible to other readers after
//! [`StoreTransaction::commit`]; dropping a transaction discards them.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::application::{Application, ApplicationAction, ApplicationSubmission};
use crate::domain::assignment::{Assignment, AssignmentApprover};
use crate::domain::context::Context;
use crate::domain::notification::{NotifiableEventPreference, NotificationPreference};
use crate::domain::workflow::{
    ApprovalLevel, Formview, Interaction, Workflow, WorkflowStage, WorkflowVersion,
};
use crate::domain::DomainError;

use super::entity::{StorageEntity, StorageKey};

/// Row filter used by [`Storage::find`]
pub type Predicate<'a, E> = &'a (dyn Fn(&E) -> bool + Send + Sync);

/// Generic storage trait for CRUD operations on one record type
#[async_trait]
pub trait Storage<E>: Send + Sync
where
    E: StorageEntity,
{
    /// Retrieves a record by its key
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves all records, ordered by key
    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Retrieves the records matching a predicate, ordered by key
    async fn find(&self, predicate: Predicate<'_, E>) -> Result<Vec<E>, DomainError> {
        Ok(self.list().await?.into_iter().filter(|e| predicate(e)).collect())
    }

    /// Inserts a record. Unsaved records get a fresh key from the store.
    async fn insert(&self, entity: E) -> Result<E, DomainError>;

    /// Updates an existing record, returns error if not found or stale
    async fn update(&self, entity: E) -> Result<E, DomainError>;

    /// Deletes a record by its key, returns true if deleted
    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError>;

    /// Checks if a record exists by its key
    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Loads a record that must exist
    async fn load(&self, key: &E::Key) -> Result<E, DomainError> {
        self.get(key).await?.ok_or_else(|| {
            DomainError::not_found(format!("{} record {} not found", E::TABLE, key.value()))
        })
    }
}

/// One unit of work over every record type of the engine
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    fn contexts(&self) -> &dyn Storage<Context>;
    fn workflows(&self) -> &dyn Storage<Workflow>;
    fn versions(&self) -> &dyn Storage<WorkflowVersion>;
    fn stages(&self) -> &dyn Storage<WorkflowStage>;
    fn approval_levels(&self) -> &dyn Storage<ApprovalLevel>;
    fn formviews(&self) -> &dyn Storage<Formview>;
    fn interactions(&self) -> &dyn Storage<Interaction>;
    fn assignments(&self) -> &dyn Storage<Assignment>;
    fn approvers(&self) -> &dyn Storage<AssignmentApprover>;
    fn applications(&self) -> &dyn Storage<Application>;
    fn actions(&self) -> &dyn Storage<ApplicationAction>;
    fn submissions(&self) -> &dyn Storage<ApplicationSubmission>;
    fn notification_preferences(&self) -> &dyn Storage<NotificationPreference>;
    fn event_preferences(&self) -> &dyn Storage<NotifiableEventPreference>;

    /// Makes every write of this transaction visible at once.
    ///
    /// Fails with [`DomainError::Conflict`] when a revisioned record changed
    /// since it was read, or when two rows claim the same ordering slot.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}

/// Entry point of the persistence boundary
#[async_trait]
pub trait ApprovalStore: Send + Sync + Debug {
    /// Starts a new transaction
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DomainError>;
}
