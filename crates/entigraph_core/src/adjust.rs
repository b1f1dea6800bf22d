//! Manual adjustments after reconciliation.
//!
//! Callers who know better than the engine can read and override the
//! decided state of any instance, or force a property's dirty flag.

use crate::error::{CoreError, CoreResult};
use crate::graph::{EntityGraph, EntityHandle};
use crate::schema::MetadataProvider;
use crate::tracker::{EntityState, Tracker};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the store will do with an instance on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistAction {
    /// Insert a new row.
    Insert,
    /// Update an existing row.
    Update,
    /// Leave the row as is.
    NoOp,
    /// Remove the row.
    Delete,
    /// Not part of the save.
    Excluded,
}

impl PersistAction {
    /// Derives the action from a tracking state and its dirty flags.
    pub const fn from_state(state: EntityState, has_modified: bool) -> Self {
        match state {
            EntityState::Added => Self::Insert,
            EntityState::Modified => Self::Update,
            EntityState::Unchanged if has_modified => Self::Update,
            EntityState::Unchanged => Self::NoOp,
            EntityState::Deleted => Self::Delete,
            EntityState::Detached => Self::Excluded,
        }
    }
}

impl fmt::Display for PersistAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::NoOp => "no-op",
            Self::Delete => "delete",
            Self::Excluded => "excluded",
        };
        f.write_str(name)
    }
}

/// Counts of planned actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Instances to insert.
    pub inserts: usize,
    /// Instances to update.
    pub updates: usize,
    /// Instances left untouched.
    pub no_ops: usize,
    /// Instances to delete.
    pub deletes: usize,
    /// Instances excluded from the save.
    pub excluded: usize,
}

impl Summary {
    fn record(&mut self, action: PersistAction) {
        match action {
            PersistAction::Insert => self.inserts += 1,
            PersistAction::Update => self.updates += 1,
            PersistAction::NoOp => self.no_ops += 1,
            PersistAction::Delete => self.deletes += 1,
            PersistAction::Excluded => self.excluded += 1,
        }
    }
}

/// Planned action of one processed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// The instance.
    pub entity: EntityHandle,
    /// Its type.
    pub type_name: String,
    /// Tracking state after reconciliation.
    pub state: EntityState,
    /// Resulting action.
    pub action: PersistAction,
    /// Dirty properties.
    pub modified: Vec<String>,
}

/// Snapshot of one scalar property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    /// Property name.
    pub name: String,
    /// Whether the property carries a dirty flag.
    pub is_modified: bool,
    /// Current value on the instance.
    pub value: Value,
}

/// Result handle of a reconciliation call.
///
/// Holds the instances processed by the call, in processing order, and
/// gives mutable access to their tracking entries.
pub struct Adjustments<'s, M: MetadataProvider + ?Sized, T: Tracker + ?Sized> {
    metadata: &'s M,
    graph: &'s EntityGraph,
    tracker: &'s mut T,
    processed: Vec<EntityHandle>,
}

impl<'s, M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Adjustments<'s, M, T> {
    pub(crate) fn new(
        metadata: &'s M,
        graph: &'s EntityGraph,
        tracker: &'s mut T,
        processed: Vec<EntityHandle>,
    ) -> Self {
        Self {
            metadata,
            graph,
            tracker,
            processed,
        }
    }

    /// Returns the processed instances in processing order.
    pub fn processed(&self) -> &[EntityHandle] {
        &self.processed
    }

    /// Opens the tracking entry of an instance.
    pub fn entry(&mut self, entity: EntityHandle) -> CoreResult<EntryMut<'_, M, T>> {
        self.graph.get(entity)?;
        Ok(EntryMut {
            metadata: self.metadata,
            graph: self.graph,
            tracker: &mut *self.tracker,
            entity,
        })
    }

    /// Returns the planned action of every processed instance.
    pub fn plan(&self) -> CoreResult<Vec<PlannedAction>> {
        self.processed
            .iter()
            .map(|&entity| {
                let state = self.tracker.state(entity);
                let modified = self.tracker.modified_properties(entity);
                Ok(PlannedAction {
                    entity,
                    type_name: self.graph.type_name(entity)?.to_string(),
                    state,
                    action: PersistAction::from_state(state, !modified.is_empty()),
                    modified,
                })
            })
            .collect()
    }

    /// Counts the planned actions of the processed instances.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for &entity in &self.processed {
            let state = self.tracker.state(entity);
            let modified = !self.tracker.modified_properties(entity).is_empty();
            summary.record(PersistAction::from_state(state, modified));
        }
        summary
    }
}

/// Mutable view of one instance's tracking entry.
pub struct EntryMut<'e, M: MetadataProvider + ?Sized, T: Tracker + ?Sized> {
    metadata: &'e M,
    graph: &'e EntityGraph,
    tracker: &'e mut T,
    entity: EntityHandle,
}

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> EntryMut<'_, M, T> {
    /// Returns the instance.
    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    /// Returns the tracking state.
    pub fn state(&self) -> EntityState {
        self.tracker.state(self.entity)
    }

    /// Overrides the tracking state.
    pub fn set_state(&mut self, state: EntityState) -> CoreResult<()> {
        self.tracker.set_state(self.entity, state)
    }

    /// Returns the planned action.
    pub fn action(&self) -> PersistAction {
        let modified = !self.tracker.modified_properties(self.entity).is_empty();
        PersistAction::from_state(self.state(), modified)
    }

    /// Reads a scalar property with its dirty flag.
    pub fn property(&self, name: &str) -> CoreResult<PropertyEntry> {
        self.check_property(name)?;
        Ok(PropertyEntry {
            name: name.to_string(),
            is_modified: self.tracker.is_modified(self.entity, name),
            value: self.graph.value(self.entity, name)?,
        })
    }

    /// Sets or clears a property's dirty flag.
    pub fn set_modified(&mut self, name: &str, modified: bool) -> CoreResult<()> {
        self.check_property(name)?;
        self.tracker.set_modified(self.entity, name, modified)
    }

    fn check_property(&self, name: &str) -> CoreResult<()> {
        let type_name = self.graph.type_name(self.entity)?;
        if self
            .metadata
            .scalar_properties_of(type_name)?
            .iter()
            .any(|p| p == name)
        {
            Ok(())
        } else {
            Err(CoreError::unknown_property(type_name, name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityRecord;
    use crate::schema::{Schema, TypeSchema};
    use crate::session::Session;
    use crate::tracker::{InMemoryTracker, PersistedRow};

    fn schema() -> Schema {
        Schema::new().with_type(
            TypeSchema::new("Category")
                .primary_key(["Id"])
                .properties(["Name"]),
        )
    }

    #[test]
    fn action_from_state() {
        assert_eq!(PersistAction::from_state(EntityState::Added, false), PersistAction::Insert);
        assert_eq!(PersistAction::from_state(EntityState::Unchanged, true), PersistAction::Update);
        assert_eq!(PersistAction::from_state(EntityState::Unchanged, false), PersistAction::NoOp);
        assert_eq!(PersistAction::from_state(EntityState::Detached, false), PersistAction::Excluded);
        assert_eq!(PersistAction::NoOp.to_string(), "no-op");
    }

    #[test]
    fn entry_overrides_state_and_flags() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let c = graph.insert(EntityRecord::new("Category").with("Id", 5).with("Name", "B"));
        let mut tracker = InMemoryTracker::new();
        tracker.add_persisted("Category", PersistedRow::new().with("Id", 5).with("Name", "B"));
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        let mut adjustments = session.define_state(c, false).unwrap();
        assert_eq!(adjustments.processed(), &[c]);
        assert_eq!(adjustments.summary().no_ops, 1);

        let mut entry = adjustments.entry(c).unwrap();
        assert_eq!(entry.state(), EntityState::Unchanged);
        entry.set_modified("Name", true).unwrap();
        let name = entry.property("Name").unwrap();
        assert!(name.is_modified);
        assert_eq!(name.value, Value::from("B"));
        assert_eq!(entry.action(), PersistAction::Update);

        entry.set_state(EntityState::Added).unwrap();
        assert_eq!(adjustments.summary().inserts, 1);
    }

    #[test]
    fn unknown_property_is_rejected() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let c = graph.insert(EntityRecord::new("Category"));
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        let mut adjustments = session.define_state(c, false).unwrap();
        let entry = adjustments.entry(c).unwrap();
        let err = entry.property("Colour").unwrap_err();
        assert!(matches!(err, CoreError::UnknownProperty { .. }));
    }

    #[test]
    fn plan_lists_processed_instances() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Category").with("Name", "A"));
        let b = graph.insert(EntityRecord::new("Category").with("Name", "B"));
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        let adjustments = session.define_state_many(&[a, b], false).unwrap();
        let plan = adjustments.plan().unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|p| p.action == PersistAction::Insert));
        assert_eq!(plan[0].type_name, "Category");
    }
}
