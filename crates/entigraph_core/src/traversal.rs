//! Graph traversal: parents, ancestors, subgraphs and dependants.

use crate::error::{CoreError, CoreResult};
use crate::graph::EntityHandle;
use crate::schema::MetadataProvider;
use crate::session::Session;
use crate::tracker::Tracker;
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'_, M, T> {
    /// Returns the direct parents of an instance.
    ///
    /// Parents are read from the `From` relations of the instance's type,
    /// in declaration order, skipping unset references. With
    /// `principal_only`, a relation is followed only if this instance's
    /// end of it is to-one, which is the case for one-to-one extensions
    /// of a principal but not for ordinary many-to-one children.
    pub fn parents_of(
        &mut self,
        entity: EntityHandle,
        principal_only: bool,
    ) -> CoreResult<Vec<EntityHandle>> {
        let type_name = self.type_of(entity)?;
        let detail = self.catalog.relations_of(&type_name)?;
        let mut parents = Vec::new();
        for relation in detail.from_relations() {
            if principal_only {
                // Without a declared reciprocal, our own source end is the
                // same cardinality the reciprocal's target would carry.
                let own_end = match self.catalog.reciprocal_of(&type_name, relation)? {
                    Some(reciprocal) => reciprocal.target_multiplicity,
                    None => relation.source_multiplicity,
                };
                if !own_end.is_to_one() {
                    continue;
                }
            }
            for parent in self.graph.targets(entity, &relation.property)? {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        trace!(%entity, principal_only, count = parents.len(), "parents resolved");
        Ok(parents)
    }

    /// Follows the first principal parent until none remains.
    ///
    /// Only the first principal parent (declaration order) is followed at
    /// each step. Memoized per session; fails with `CycleDetected` if the
    /// walk returns to an instance already on its path.
    pub fn uppermost_principal_parent(&mut self, entity: EntityHandle) -> CoreResult<EntityHandle> {
        if let Some(&top) = self.memo.principal_parent.get(&entity) {
            return Ok(top);
        }

        let mut path = vec![entity];
        let mut current = entity;
        let top = loop {
            if current != entity {
                if let Some(&top) = self.memo.principal_parent.get(&current) {
                    break top;
                }
            }
            match self.parents_of(current, true)?.first().copied() {
                None => break current,
                Some(parent) if path.contains(&parent) => {
                    return Err(CoreError::cycle_detected(parent, "principal parent"));
                }
                Some(parent) => {
                    path.push(parent);
                    current = parent;
                }
            }
        };

        for visited in path {
            self.memo.principal_parent.insert(visited, top);
        }
        Ok(top)
    }

    /// Loose breadth-first walk to an upper ancestor over all parents.
    ///
    /// The result advances to a frontier only when that frontier holds
    /// exactly one instance. Frontiers with several instances do not move
    /// the result but are still expanded to the union of their parents, so
    /// a later single-instance frontier moves it again. The result is not
    /// necessarily a topological root when branches end at different
    /// heights. Every instance is expanded at most once. Memoized.
    pub fn uppermost_parent(&mut self, entity: EntityHandle) -> CoreResult<EntityHandle> {
        if let Some(&top) = self.memo.uppermost_parent.get(&entity) {
            return Ok(top);
        }

        let mut uppermost = entity;
        let mut expanded = HashSet::from([entity]);
        let mut frontier = self.parents_of(entity, false)?;
        frontier.retain(|p| *p != entity);

        while !frontier.is_empty() {
            if let [single] = frontier.as_slice() {
                uppermost = *single;
            }
            let mut next = Vec::new();
            for member in frontier {
                if !expanded.insert(member) {
                    continue;
                }
                for parent in self.parents_of(member, false)? {
                    if !expanded.contains(&parent) && !next.contains(&parent) {
                        next.push(parent);
                    }
                }
            }
            frontier = next;
        }

        self.memo.uppermost_parent.insert(entity, uppermost);
        Ok(uppermost)
    }

    /// Collects an instance and everything reachable from it through any
    /// declared navigation property, parent or child.
    ///
    /// `visited` is an accumulator: instances already in it are neither
    /// revisited nor expanded, so successive calls for siblings share it.
    pub fn collect_subgraph(
        &mut self,
        entity: EntityHandle,
        visited: &mut BTreeSet<EntityHandle>,
    ) -> CoreResult<()> {
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let type_name = self.type_of(current)?;
            let detail = self.catalog.relations_of(&type_name)?;
            let mut neighbours = Vec::new();
            for relation in &detail.relations {
                neighbours.extend(self.graph.targets(current, &relation.property)?);
            }
            stack.extend(
                neighbours
                    .into_iter()
                    .rev()
                    .filter(|n| !visited.contains(n)),
            );
        }
        Ok(())
    }

    /// Returns the direct dependants (FK children) of an instance.
    ///
    /// Covers instances listed in the instance's own `To` navigations as
    /// well as pending instances whose `From` navigation points back at it,
    /// declared reciprocal or not.
    pub fn dependants_of(&mut self, entity: EntityHandle) -> CoreResult<Vec<EntityHandle>> {
        let type_name = self.type_of(entity)?;
        let detail = self.catalog.relations_of(&type_name)?;
        let mut dependants = Vec::new();

        for relation in detail.to_relations() {
            for child in self.graph.targets(entity, &relation.property)? {
                if child != entity && !dependants.contains(&child) {
                    dependants.push(child);
                }
            }
        }

        for (owner, relation) in self.catalog.dependent_relations(&type_name)? {
            for candidate in self.local_of_type(&owner)? {
                if candidate == entity || dependants.contains(&candidate) {
                    continue;
                }
                if self.graph.targets(candidate, &relation.property)?.contains(&entity) {
                    dependants.push(candidate);
                }
            }
        }
        Ok(dependants)
    }
}
