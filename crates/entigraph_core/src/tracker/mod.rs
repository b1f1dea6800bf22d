//! Change-tracking layer consumed by the engine.

mod memory;
mod state;

pub use memory::InMemoryTracker;
pub use state::{EntityState, PersistedRow, TrackingEntry};

use crate::error::CoreResult;
use crate::graph::EntityHandle;

/// Change-tracking store the engine reconciles against.
///
/// Implementations own one tracking entry per attached instance and the
/// persisted snapshot of each type. The engine assumes exclusive access
/// for the duration of a session.
pub trait Tracker {
    /// Returns the tracking state; untracked instances are `Detached`.
    fn state(&self, entity: EntityHandle) -> EntityState;

    /// Sets the tracking state.
    ///
    /// Setting `Detached` discards the entry, including its dirty flags.
    fn set_state(&mut self, entity: EntityHandle, state: EntityState) -> CoreResult<()>;

    /// Returns true if the property carries a dirty flag.
    fn is_modified(&self, entity: EntityHandle, property: &str) -> bool;

    /// Sets or clears a property's dirty flag.
    fn set_modified(&mut self, entity: EntityHandle, property: &str, modified: bool)
        -> CoreResult<()>;

    /// Returns the dirty properties of an instance.
    fn modified_properties(&self, entity: EntityHandle) -> Vec<String>;

    /// Returns every pending (attached, not deleted) instance in handle order.
    fn local(&self) -> Vec<EntityHandle>;

    /// Returns the persisted rows of a type.
    fn persisted(&self, type_name: &str) -> &[PersistedRow];

    /// Checks that a navigation property of `entity` may be rewritten.
    ///
    /// Fails with `ReferentialIntegrityConflict` when the entry's state
    /// forbids key changes.
    fn check_reference_change(&self, entity: EntityHandle, property: &str) -> CoreResult<()> {
        let _ = (entity, property);
        Ok(())
    }
}
