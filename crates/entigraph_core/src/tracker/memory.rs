//! In-memory tracker.

use crate::error::{CoreError, CoreResult};
use crate::graph::EntityHandle;
use crate::tracker::{EntityState, PersistedRow, Tracker, TrackingEntry};
use std::collections::{BTreeMap, HashMap};

/// Tracker keeping entries and the persisted snapshot in memory.
///
/// Mirrors the behaviour of a typical ORM change tracker closely enough
/// for reconciliation: detaching discards the entry, accepting an
/// instance as `Unchanged` clears its dirty flags, and by default
/// references of `Unchanged`/`Modified` instances cannot be rewritten.
#[derive(Debug, Clone)]
pub struct InMemoryTracker {
    entries: BTreeMap<EntityHandle, TrackingEntry>,
    persisted: HashMap<String, Vec<PersistedRow>>,
    strict_references: bool,
}

impl Default for InMemoryTracker {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            persisted: HashMap::new(),
            strict_references: true,
        }
    }
}

impl InMemoryTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether locked states refuse reference rewrites.
    #[must_use]
    pub fn strict_references(mut self, value: bool) -> Self {
        self.strict_references = value;
        self
    }

    /// Adds a row to the persisted snapshot of a type.
    pub fn add_persisted(&mut self, type_name: impl Into<String>, row: PersistedRow) {
        self.persisted.entry(type_name.into()).or_default().push(row);
    }

    /// Attaches an instance in the given state.
    pub fn attach(&mut self, entity: EntityHandle, state: EntityState) -> CoreResult<()> {
        self.set_state(entity, state)
    }

    /// Returns the entry of an attached instance.
    pub fn entry(&self, entity: EntityHandle) -> Option<&TrackingEntry> {
        self.entries.get(&entity)
    }

    /// Returns the number of attached instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Tracker for InMemoryTracker {
    fn state(&self, entity: EntityHandle) -> EntityState {
        self.entries
            .get(&entity)
            .map_or(EntityState::Detached, |e| e.state)
    }

    fn set_state(&mut self, entity: EntityHandle, state: EntityState) -> CoreResult<()> {
        match state {
            EntityState::Detached => {
                self.entries.remove(&entity);
            }
            _ => {
                let entry = self
                    .entries
                    .entry(entity)
                    .or_insert_with(|| TrackingEntry::new(state));
                entry.state = state;
                if state == EntityState::Unchanged {
                    entry.modified.clear();
                }
            }
        }
        Ok(())
    }

    fn is_modified(&self, entity: EntityHandle, property: &str) -> bool {
        self.entries
            .get(&entity)
            .is_some_and(|e| e.modified.contains(property))
    }

    fn set_modified(
        &mut self,
        entity: EntityHandle,
        property: &str,
        modified: bool,
    ) -> CoreResult<()> {
        let entry = self.entries.get_mut(&entity).ok_or_else(|| {
            CoreError::invalid_input(format!("cannot flag {property} on detached {entity}"))
        })?;
        if modified {
            entry.modified.insert(property.to_string());
        } else {
            entry.modified.remove(property);
        }
        Ok(())
    }

    fn modified_properties(&self, entity: EntityHandle) -> Vec<String> {
        self.entries
            .get(&entity)
            .map(|e| e.modified.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn local(&self) -> Vec<EntityHandle> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state != EntityState::Deleted)
            .map(|(h, _)| *h)
            .collect()
    }

    fn persisted(&self, type_name: &str) -> &[PersistedRow] {
        self.persisted
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn check_reference_change(&self, entity: EntityHandle, property: &str) -> CoreResult<()> {
        let state = self.state(entity);
        if self.strict_references && state.locks_references() {
            return Err(CoreError::ReferentialIntegrityConflict {
                entity,
                property: property.to_string(),
                state: state.to_string(),
            });
        }
        Ok(())
    }
}
