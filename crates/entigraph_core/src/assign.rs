//! Per-instance state decision.

use crate::error::CoreResult;
use crate::graph::EntityHandle;
use crate::schema::MetadataProvider;
use crate::session::Session;
use crate::tracker::{EntityState, PersistedRow, Tracker};
use tracing::{debug, trace};

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'_, M, T> {
    /// Decides the persistence state of one instance.
    ///
    /// An instance matching a persisted row becomes `Unchanged`, takes
    /// over the row's key values and gets a dirty flag for every scalar
    /// whose value differs from the row. Anything else ends up `Added`.
    /// Pending duplicates are merged on the way. Detached instances are
    /// left alone.
    pub(crate) fn assign(&mut self, entity: EntityHandle) -> CoreResult<()> {
        let state = self.tracker.state(entity);
        if state == EntityState::Detached {
            trace!(%entity, "skipping detached instance");
            return Ok(());
        }

        let matching = self.matching_persisted(entity)?;
        if let Some(row) = &matching {
            if state != EntityState::Added {
                self.tracker.set_state(entity, EntityState::Detached)?;
                self.tracker.set_state(entity, EntityState::Added)?;
            }
            self.copy_keys(entity, row)?;
        }

        if self.config.merge_duplicates {
            self.resolve_duplicates(entity)?;
        }

        let type_name = self.type_of(entity)?;
        match matching {
            Some(row) => {
                self.tracker.set_state(entity, EntityState::Unchanged)?;
                if self.config.compare_persisted_values {
                    self.flag_differences(entity, &type_name, &row)?;
                }
            }
            None => {
                let metadata = self.catalog.metadata();
                let mut has_key = false;
                for key in metadata.primary_keys_of(&type_name)? {
                    if !self.graph.value(entity, &key)?.is_default() {
                        has_key = true;
                        break;
                    }
                }
                // Re-entering through Unchanged resets an explicit key's entry.
                if has_key {
                    self.tracker.set_state(entity, EntityState::Unchanged)?;
                }
                self.tracker.set_state(entity, EntityState::Added)?;
            }
        }

        debug!(
            %entity,
            type_name = %type_name,
            state = %self.tracker.state(entity),
            modified = self.tracker.modified_properties(entity).len(),
            "state assigned"
        );
        Ok(())
    }

    fn copy_keys(&mut self, entity: EntityHandle, row: &PersistedRow) -> CoreResult<()> {
        let type_name = self.type_of(entity)?;
        for key in self.catalog.metadata().primary_keys_of(&type_name)? {
            self.graph.set_value(entity, &key, row.value(&key))?;
        }
        Ok(())
    }

    fn flag_differences(
        &mut self,
        entity: EntityHandle,
        type_name: &str,
        row: &PersistedRow,
    ) -> CoreResult<()> {
        for property in self.catalog.metadata().scalar_properties_of(type_name)? {
            let value = self.resolved_value(entity, &property)?;
            if value != row.value(&property) {
                trace!(%entity, property = %property, "differs from persisted row");
                self.tracker.set_modified(entity, &property, true)?;
            }
        }
        Ok(())
    }
}
