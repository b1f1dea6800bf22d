//! Tracking state.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Persistence state of a tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Not tracked; excluded from persistence.
    Detached,
    /// Will be inserted.
    Added,
    /// Tracked and persisted; dirty flags carry field-level updates.
    Unchanged,
    /// Tracked and persisted, with a whole-row update pending.
    Modified,
    /// Will be deleted.
    Deleted,
}

impl EntityState {
    /// Returns true if the state forbids rewriting key-bearing references.
    pub const fn locks_references(self) -> bool {
        matches!(self, EntityState::Unchanged | EntityState::Modified)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityState::Detached => "Detached",
            EntityState::Added => "Added",
            EntityState::Unchanged => "Unchanged",
            EntityState::Modified => "Modified",
            EntityState::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// Tracking entry of one attached instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingEntry {
    /// Current state.
    pub state: EntityState,
    /// Properties with a dirty flag.
    pub modified: BTreeSet<String>,
}

impl TrackingEntry {
    /// Creates an entry without dirty flags.
    pub fn new(state: EntityState) -> Self {
        Self {
            state,
            modified: BTreeSet::new(),
        }
    }
}

/// A row of the persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedRow(BTreeMap<String, Value>);

impl PersistedRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column (builder form).
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Returns a column, `Null` when absent.
    pub fn value(&self, column: &str) -> Value {
        self.0.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Returns all columns.
    pub fn columns(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}
