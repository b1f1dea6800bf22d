//! Reconciliation session and caller-facing entry points.

use crate::adjust::Adjustments;
use crate::catalog::RelationshipCatalog;
use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult};
use crate::graph::{EntityGraph, EntityHandle};
use crate::schema::MetadataProvider;
use crate::tracker::{EntityState, Tracker};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Handle-keyed memo caches of one top-level call.
#[derive(Debug, Default)]
pub(crate) struct MemoCaches {
    pub(crate) principal_parent: HashMap<EntityHandle, EntityHandle>,
    pub(crate) uppermost_parent: HashMap<EntityHandle, EntityHandle>,
    pub(crate) self_ancestors: HashMap<EntityHandle, usize>,
}

impl MemoCaches {
    pub(crate) fn clear(&mut self) {
        self.principal_parent.clear();
        self.uppermost_parent.clear();
        self.self_ancestors.clear();
    }
}

/// One reconciliation session.
///
/// A session borrows the caller's entity graph and tracker exclusively,
/// owns the relationship catalog for its lifetime, and owns memo caches
/// that are reset at the start of every entry point. Nothing is shared
/// between sessions.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = Session::new(&schema, &mut graph, &mut tracker);
/// let mut adjustments = session.define_state(order, true)?;
/// adjustments.entry(order)?.set_state(EntityState::Unchanged)?;
/// ```
pub struct Session<'a, M: MetadataProvider + ?Sized, T: Tracker + ?Sized> {
    pub(crate) catalog: RelationshipCatalog<'a, M>,
    pub(crate) graph: &'a mut EntityGraph,
    pub(crate) tracker: &'a mut T,
    pub(crate) config: SessionConfig,
    pub(crate) memo: MemoCaches,
}

impl<'a, M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'a, M, T> {
    /// Creates a session with the default configuration.
    pub fn new(metadata: &'a M, graph: &'a mut EntityGraph, tracker: &'a mut T) -> Self {
        Self::with_config(metadata, graph, tracker, SessionConfig::default())
    }

    /// Creates a session with an explicit configuration.
    pub fn with_config(
        metadata: &'a M,
        graph: &'a mut EntityGraph,
        tracker: &'a mut T,
        config: SessionConfig,
    ) -> Self {
        Self {
            catalog: RelationshipCatalog::new(metadata),
            graph,
            tracker,
            config,
            memo: MemoCaches::default(),
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the entity graph.
    pub fn graph(&self) -> &EntityGraph {
        &*self.graph
    }

    /// Returns the tracker.
    pub fn tracker(&self) -> &T {
        &*self.tracker
    }

    /// Reconciles every pending instance of the tracker, with children.
    ///
    /// The uppermost parent of each pending instance seeds the walk.
    pub fn define_state_for_all(&mut self) -> CoreResult<Adjustments<'_, M, T>> {
        self.memo.clear();
        let mut roots = Vec::new();
        for entity in self.tracker.local() {
            let root = self.uppermost_parent(entity)?;
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        if roots.is_empty() {
            return Ok(Adjustments::new(
                self.catalog.metadata(),
                &*self.graph,
                &mut *self.tracker,
                Vec::new(),
            ));
        }
        self.define_state_many(&roots, true)
    }

    /// Reconciles one instance, optionally with its whole reachable graph.
    pub fn define_state(
        &mut self,
        entity: EntityHandle,
        include_children: bool,
    ) -> CoreResult<Adjustments<'_, M, T>> {
        self.define_state_many(&[entity], include_children)
    }

    /// Reconciles a list of instances.
    ///
    /// Without children, every input is promoted from `Detached` to `Added`
    /// and assigned independently in input order. With children, the
    /// reachable graph of every input is collected, grouped by type, and
    /// assigned type by type in processing order, each type in
    /// within-type order, so principals are settled before dependents.
    pub fn define_state_many(
        &mut self,
        entities: &[EntityHandle],
        include_children: bool,
    ) -> CoreResult<Adjustments<'_, M, T>> {
        if entities.is_empty() {
            return Err(CoreError::invalid_input("no entities given"));
        }
        for &entity in entities {
            self.graph.get(entity)?;
        }
        self.memo.clear();

        let processed = if include_children {
            self.assign_graph(entities)?
        } else {
            for &entity in entities {
                self.promote(entity)?;
            }
            for &entity in entities {
                self.assign(entity)?;
            }
            entities.to_vec()
        };
        debug!(count = processed.len(), include_children, "states defined");
        Ok(Adjustments::new(
            self.catalog.metadata(),
            &*self.graph,
            &mut *self.tracker,
            processed,
        ))
    }

    /// Detaches an instance's transitive dependants, and the instance
    /// itself when `remove_root` is set.
    ///
    /// Returns the instances that were detached.
    pub fn detach_with_dependants(
        &mut self,
        entity: EntityHandle,
        remove_root: bool,
    ) -> CoreResult<Vec<EntityHandle>> {
        self.graph.get(entity)?;
        self.memo.clear();
        self.detach_subgraph(entity, remove_root)
    }

    fn assign_graph(&mut self, entities: &[EntityHandle]) -> CoreResult<Vec<EntityHandle>> {
        let mut visited = BTreeSet::new();
        for &entity in entities {
            self.collect_subgraph(entity, &mut visited)?;
        }

        let mut by_type: BTreeMap<String, Vec<EntityHandle>> = BTreeMap::new();
        for &entity in &visited {
            self.promote(entity)?;
            let type_name = self.type_of(entity)?;
            by_type.entry(type_name).or_default().push(entity);
        }

        let mut processed = Vec::with_capacity(visited.len());
        for type_name in self.type_processing_order()? {
            let Some(instances) = by_type.remove(&type_name) else {
                continue;
            };
            for entity in self.within_type_order(&instances)? {
                self.assign(entity)?;
                processed.push(entity);
            }
        }
        if let Some(type_name) = by_type.keys().next() {
            return Err(CoreError::metadata_missing(type_name.clone()));
        }
        Ok(processed)
    }

    fn promote(&mut self, entity: EntityHandle) -> CoreResult<()> {
        if self.tracker.state(entity) == EntityState::Detached {
            self.tracker.set_state(entity, EntityState::Added)?;
        }
        Ok(())
    }

    pub(crate) fn type_of(&self, entity: EntityHandle) -> CoreResult<String> {
        Ok(self.graph.type_name(entity)?.to_string())
    }

    /// Pending instances of one type, in handle order.
    pub(crate) fn local_of_type(&self, type_name: &str) -> CoreResult<Vec<EntityHandle>> {
        let mut found = Vec::new();
        for entity in self.tracker.local() {
            if self.graph.type_name(entity)? == type_name {
                found.push(entity);
            }
        }
        Ok(found)
    }
}
