//! In-memory transactional storage implementation
//!
//! Committed rows live behind one `RwLock`. A transaction keeps a private
//! overlay per table; reads see the overlay first, and commit validates every
//! table before applying anything so a failed commit leaves no partial state.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::application::{Application, ApplicationAction, ApplicationSubmission};
use crate::domain::assignment::{Assignment, AssignmentApprover};
use crate::domain::context::Context;
use crate::domain::notification::{NotifiableEventPreference, NotificationPreference};
use crate::domain::storage::{ApprovalStore, Storage, StorageEntity, StorageKey, StoreTransaction};
use crate::domain::workflow::{
    ApprovalLevel, Formview, Interaction, Workflow, WorkflowStage, WorkflowVersion,
};
use crate::domain::DomainError;

/// Binds an entity type to its committed table
trait Table: StorageEntity {
    fn rows(tables: &Tables) -> &BTreeMap<i64, Self>;
    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self>;
}

macro_rules! tables {
    ($($field:ident: $entity:ty),* $(,)?) => {
        #[derive(Debug, Default)]
        struct Tables {
            $($field: BTreeMap<i64, $entity>,)*
        }

        $(
            impl Table for $entity {
                fn rows(tables: &Tables) -> &BTreeMap<i64, Self> {
                    &tables.$field
                }

                fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
                    &mut tables.$field
                }
            }
        )*

        struct InMemoryTransaction {
            shared: Arc<Shared>,
            $($field: TableTx<$entity>,)*
        }

        impl InMemoryTransaction {
            fn new(shared: Arc<Shared>) -> Self {
                Self {
                    $($field: TableTx::new(shared.clone()),)*
                    shared,
                }
            }

            fn pending_writes(&self) -> Result<usize, DomainError> {
                let mut total = 0;
                $(total += self.$field.pending()?;)*
                Ok(total)
            }

            fn validate(&self, tables: &Tables) -> Result<(), DomainError> {
                $(self.$field.validate(tables)?;)*
                Ok(())
            }

            fn apply(self, tables: &mut Tables) -> Result<(), DomainError> {
                $(self.$field.apply(tables)?;)*
                Ok(())
            }
        }
    };
}

tables! {
    contexts: Context,
    workflows: Workflow,
    versions: WorkflowVersion,
    stages: WorkflowStage,
    approval_levels: ApprovalLevel,
    formviews: Formview,
    interactions: Interaction,
    assignments: Assignment,
    approvers: AssignmentApprover,
    applications: Application,
    actions: ApplicationAction,
    submissions: ApplicationSubmission,
    notification_preferences: NotificationPreference,
    event_preferences: NotifiableEventPreference,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    sequence: AtomicI64,
}

impl Shared {
    fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// In-memory approval store, shared by cloning
#[derive(Debug, Clone, Default)]
pub struct InMemoryApprovalStore {
    shared: Arc<Shared>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DomainError> {
        Ok(Box::new(InMemoryTransaction::new(self.shared.clone())))
    }
}

fn lock_error(kind: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::storage(format!("Failed to acquire {} lock: {}", kind, e))
}

/// Pending writes of one table. `None` marks a deleted row.
struct TableTx<E> {
    shared: Arc<Shared>,
    overlay: Mutex<BTreeMap<i64, Option<E>>>,
    /// Committed revision each touched revisioned row had when first read
    expected: Mutex<HashMap<i64, Option<u64>>>,
}

impl<E: Table> TableTx<E> {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            overlay: Mutex::new(BTreeMap::new()),
            expected: Mutex::new(HashMap::new()),
        }
    }

    fn committed(&self, key: i64) -> Result<Option<E>, DomainError> {
        let tables = self
            .shared
            .tables
            .read()
            .map_err(|e| lock_error("read", e))?;
        Ok(E::rows(&tables).get(&key).cloned())
    }

    fn visible(&self, key: i64) -> Result<Option<E>, DomainError> {
        {
            let overlay = self.overlay.lock().map_err(|e| lock_error("overlay", e))?;
            if let Some(entry) = overlay.get(&key) {
                return Ok(entry.clone());
            }
        }
        self.committed(key)
    }

    fn remember_committed_revision(&self, key: i64) -> Result<(), DomainError> {
        let mut expected = self
            .expected
            .lock()
            .map_err(|e| lock_error("overlay", e))?;
        if expected.contains_key(&key) {
            return Ok(());
        }
        if let Some(row) = self.committed(key)? {
            if row.revision().is_some() {
                expected.insert(key, row.revision());
            }
        }
        Ok(())
    }

    fn write(&self, key: i64, entry: Option<E>) -> Result<(), DomainError> {
        let mut overlay = self.overlay.lock().map_err(|e| lock_error("overlay", e))?;
        overlay.insert(key, entry);
        Ok(())
    }

    fn pending(&self) -> Result<usize, DomainError> {
        let overlay = self.overlay.lock().map_err(|e| lock_error("overlay", e))?;
        Ok(overlay.len())
    }

    fn validate(&self, tables: &Tables) -> Result<(), DomainError> {
        let rows = E::rows(tables);

        let expected = self
            .expected
            .lock()
            .map_err(|e| lock_error("overlay", e))?;
        for (key, revision) in expected.iter() {
            let current = rows.get(key).map(|row| row.revision());
            if current != Some(*revision) {
                return Err(DomainError::conflict(format!(
                    "{} record {} was modified by another transaction",
                    E::TABLE,
                    key
                )));
            }
        }

        let overlay = self.overlay.lock().map_err(|e| lock_error("overlay", e))?;
        if overlay.is_empty() {
            return Ok(());
        }

        let mut slots: HashMap<(i64, i32), i64> = HashMap::new();
        let committed = rows
            .iter()
            .filter(|(key, _)| !overlay.contains_key(*key))
            .map(|(key, row)| (*key, row));
        let written = overlay
            .iter()
            .filter_map(|(key, entry)| entry.as_ref().map(|row| (*key, row)));

        for (key, row) in committed.chain(written) {
            if let Some(slot) = row.ordering_slot() {
                if let Some(other) = slots.insert(slot, key) {
                    return Err(DomainError::conflict(format!(
                        "{} records {} and {} share sort order {} under parent {}",
                        E::TABLE,
                        other,
                        key,
                        slot.1,
                        slot.0
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply(self, tables: &mut Tables) -> Result<(), DomainError> {
        let overlay = self
            .overlay
            .into_inner()
            .map_err(|e| lock_error("overlay", e))?;
        let rows = E::rows_mut(tables);
        for (key, entry) in overlay {
            match entry {
                Some(row) => {
                    rows.insert(key, row);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Table> Storage<E> for TableTx<E> {
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        self.visible(key.value())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let mut rows = {
            let tables = self
                .shared
                .tables
                .read()
                .map_err(|e| lock_error("read", e))?;
            E::rows(&tables).clone()
        };

        let overlay = self.overlay.lock().map_err(|e| lock_error("overlay", e))?;
        for (key, entry) in overlay.iter() {
            match entry {
                Some(row) => {
                    rows.insert(*key, row.clone());
                }
                None => {
                    rows.remove(key);
                }
            }
        }
        Ok(rows.into_values().collect())
    }

    async fn insert(&self, mut entity: E) -> Result<E, DomainError> {
        if !entity.key().is_new() {
            return Err(DomainError::validation(format!(
                "{} record {} is already saved",
                E::TABLE,
                entity.key().value()
            )));
        }

        let id = self.shared.next_id();
        entity.set_key(E::Key::from_value(id));
        if entity.revision().is_some() {
            entity.set_revision(0);
        }
        self.write(id, Some(entity.clone()))?;
        Ok(entity)
    }

    async fn update(&self, mut entity: E) -> Result<E, DomainError> {
        let key = entity.key().value();
        let current = self.visible(key)?.ok_or_else(|| {
            DomainError::not_found(format!("{} record {} not found", E::TABLE, key))
        })?;

        if let Some(revision) = entity.revision() {
            if current.revision() != Some(revision) {
                return Err(DomainError::conflict(format!(
                    "{} record {} was modified since it was read",
                    E::TABLE,
                    key
                )));
            }
            self.remember_committed_revision(key)?;
            entity.set_revision(revision + 1);
        }

        self.write(key, Some(entity.clone()))?;
        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let key = key.value();
        if self.visible(key)?.is_none() {
            return Ok(false);
        }
        self.remember_committed_revision(key)?;
        self.write(key, None)?;
        Ok(true)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    fn contexts(&self) -> &dyn Storage<Context> {
        &self.contexts
    }

    fn workflows(&self) -> &dyn Storage<Workflow> {
        &self.workflows
    }

    fn versions(&self) -> &dyn Storage<WorkflowVersion> {
        &self.versions
    }

    fn stages(&self) -> &dyn Storage<WorkflowStage> {
        &self.stages
    }

    fn approval_levels(&self) -> &dyn Storage<ApprovalLevel> {
        &self.approval_levels
    }

    fn formviews(&self) -> &dyn Storage<Formview> {
        &self.formviews
    }

    fn interactions(&self) -> &dyn Storage<Interaction> {
        &self.interactions
    }

    fn assignments(&self) -> &dyn Storage<Assignment> {
        &self.assignments
    }

    fn approvers(&self) -> &dyn Storage<AssignmentApprover> {
        &self.approvers
    }

    fn applications(&self) -> &dyn Storage<Application> {
        &self.applications
    }

    fn actions(&self) -> &dyn Storage<ApplicationAction> {
        &self.actions
    }

    fn submissions(&self) -> &dyn Storage<ApplicationSubmission> {
        &self.submissions
    }

    fn notification_preferences(&self) -> &dyn Storage<NotificationPreference> {
        &self.notification_preferences
    }

    fn event_preferences(&self) -> &dyn Storage<NotifiableEventPreference> {
        &self.event_preferences
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let tx = *self;
        let writes = tx.pending_writes()?;
        let shared = tx.shared.clone();
        let mut tables = shared
            .tables
            .write()
            .map_err(|e| lock_error("write", e))?;

        tx.validate(&tables)?;
        tx.apply(&mut tables)?;

        debug!(writes = writes, "Committed in-memory transaction");
        Ok(())
    }
}
