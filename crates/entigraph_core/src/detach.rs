//! Detaching an instance together with its dependants.

use crate::error::CoreResult;
use crate::graph::EntityHandle;
use crate::schema::MetadataProvider;
use crate::session::Session;
use crate::tracker::{EntityState, Tracker};
use std::collections::HashSet;
use tracing::debug;

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'_, M, T> {
    pub(crate) fn detach_subgraph(
        &mut self,
        entity: EntityHandle,
        remove_root: bool,
    ) -> CoreResult<Vec<EntityHandle>> {
        // Collect first: back-pointer dependants are only found while tracked.
        let mut visited = HashSet::from([entity]);
        let mut stack = vec![entity];
        let mut order = Vec::new();
        while let Some(current) = stack.pop() {
            order.push(current);
            let dependants = self.dependants_of(current)?;
            for dependant in dependants.into_iter().rev() {
                if visited.insert(dependant) {
                    stack.push(dependant);
                }
            }
        }

        let detached: Vec<_> = order
            .into_iter()
            .filter(|h| remove_root || *h != entity)
            .collect();
        for &handle in &detached {
            self.tracker.set_state(handle, EntityState::Detached)?;
        }

        let mut survivors = self.tracker.local();
        if !remove_root && !survivors.contains(&entity) {
            survivors.push(entity);
        }
        for survivor in survivors {
            let properties: Vec<String> = self
                .graph
                .get(survivor)?
                .navigations()
                .map(|(name, _)| name.to_string())
                .collect();
            for property in &properties {
                for &handle in &detached {
                    self.graph.unlink(survivor, property, handle)?;
                }
            }
        }

        debug!(%entity, remove_root, count = detached.len(), "detached with dependants");
        Ok(detached)
    }
}
