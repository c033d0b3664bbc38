//! Storage entity traits and types

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// Trait for integer record keys
pub trait StorageKey: Copy + Debug + Send + Sync + Eq + std::hash::Hash + Ord {
    /// Returns the raw key value
    fn value(&self) -> i64;

    /// Builds a key from a raw value
    fn from_value(value: i64) -> Self;

    /// Whether this key marks a record that has not been persisted yet
    fn is_new(&self) -> bool {
        self.value() == 0
    }
}

/// Trait for types that can be stored
pub trait StorageEntity:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The key type for this entity
    type Key: StorageKey;

    /// Table name, used in error messages
    const TABLE: &'static str;

    /// Returns the entity's key
    fn key(&self) -> Self::Key;

    /// Replaces the entity's key (called by the store on insert)
    fn set_key(&mut self, key: Self::Key);

    /// Optimistic lock counter. Entities returning `Some` are checked on update:
    /// the stored revision must match, and the store bumps it on write.
    fn revision(&self) -> Option<u64> {
        None
    }

    fn set_revision(&mut self, _revision: u64) {}

    /// `(parent id, sort order)` slot that must be unique within the table
    fn ordering_slot(&self) -> Option<(i64, i32)> {
        None
    }
}
