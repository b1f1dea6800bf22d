//! Duplicate detection and merging.

use crate::error::CoreResult;
use crate::graph::{EntityHandle, Navigation};
use crate::schema::{MetadataProvider, Multiplicity, NavigationRelation};
use crate::session::Session;
use crate::tracker::{EntityState, Tracker};
use tracing::{debug, warn};

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'_, M, T> {
    /// Merges pending instances that share an identity with `entity`.
    ///
    /// For each pending match, the match's uppermost principal parent has
    /// its references moved onto the uppermost principal parent of
    /// `entity`, then is detached together with its dependants. When no
    /// match is found and the instance hangs off a principal, the search
    /// is repeated on that principal.
    ///
    /// Returns the number of merged duplicates.
    pub fn resolve_duplicates(&mut self, entity: EntityHandle) -> CoreResult<usize> {
        let mut current = entity;
        loop {
            let merged = self.merge_matches(current)?;
            if merged > 0 || !self.config.search_principal_parents {
                return Ok(merged);
            }
            let principal = self.uppermost_principal_parent(current)?;
            if principal == current {
                return Ok(0);
            }
            current = principal;
        }
    }

    fn merge_matches(&mut self, entity: EntityHandle) -> CoreResult<usize> {
        let Some(filter) = self.identity_filter(entity)? else {
            return Ok(0);
        };

        let mut merged = 0;
        for candidate in self.local_of_type(&filter.type_name)? {
            if candidate == entity || self.tracker.state(candidate) == EntityState::Detached {
                continue;
            }
            if !self.matches_instance(&filter, candidate)? {
                continue;
            }

            let (duplicate, keep) = self.merge_targets(candidate, entity)?;
            if duplicate == keep || self.tracker.state(duplicate) == EntityState::Detached {
                continue;
            }
            debug!(%entity, %candidate, %duplicate, %keep, "merging duplicate");
            self.relink_references(duplicate, keep)?;
            self.release_links(keep, duplicate)?;
            self.detach_subgraph(duplicate, true)?;
            self.memo.clear();
            merged += 1;
        }
        Ok(merged)
    }

    /// Picks the pair of instances a match is merged through: both
    /// uppermost principal parents, or the instances themselves when
    /// those parents are of different types or are the same instance.
    fn merge_targets(
        &mut self,
        duplicate: EntityHandle,
        keep: EntityHandle,
    ) -> CoreResult<(EntityHandle, EntityHandle)> {
        let duplicate_top = self.uppermost_principal_parent(duplicate)?;
        let keep_top = self.uppermost_principal_parent(keep)?;
        if duplicate_top != keep_top
            && self.graph.type_name(duplicate_top)? == self.graph.type_name(keep_top)?
        {
            Ok((duplicate_top, keep_top))
        } else {
            Ok((duplicate, keep))
        }
    }

    /// Clears every navigation of `keep` that still targets `duplicate`,
    /// so detaching the duplicate's dependants cannot reach `keep`.
    fn release_links(&mut self, keep: EntityHandle, duplicate: EntityHandle) -> CoreResult<()> {
        let properties: Vec<String> = self
            .graph
            .get(keep)?
            .navigations()
            .filter(|(_, nav)| nav.contains(duplicate))
            .map(|(property, _)| property.to_string())
            .collect();
        for property in properties {
            self.graph.unlink(keep, &property, duplicate)?;
        }
        Ok(())
    }

    /// Moves every reference to `from` onto `to`.
    ///
    /// Dependants reached through the `To` relations of `from`'s type,
    /// whether listed in `from`'s navigation or pointing back at it, have
    /// their reciprocal reference rewritten and are added to `to`'s
    /// navigation. A to-one navigation on `to` that is already occupied
    /// keeps its current dependant. Pending instances holding a
    /// non-reciprocal to-one reference to `from` are rewritten as well.
    pub fn relink_references(&mut self, from: EntityHandle, to: EntityHandle) -> CoreResult<()> {
        let type_name = self.type_of(from)?;
        let detail = self.catalog.relations_of(&type_name)?;

        for relation in detail.to_relations() {
            let reciprocal = self.catalog.reciprocal_of(&type_name, relation)?;
            let mut children = self.graph.targets(from, &relation.property)?;
            if let Some(reciprocal) = &reciprocal {
                for candidate in self.local_of_type(&relation.partner_type)? {
                    if candidate != from
                        && !children.contains(&candidate)
                        && self.graph.targets(candidate, &reciprocal.property)?.contains(&from)
                    {
                        children.push(candidate);
                    }
                }
            }

            for child in children {
                if child == from || child == to {
                    continue;
                }
                if !self.has_room(to, relation)? {
                    continue;
                }
                if let Some(reciprocal) = &reciprocal {
                    let property = reciprocal.property.clone();
                    self.with_state_override(child, |session| {
                        session.rewrite_reference(child, &property, from, to)
                    })?;
                }
                self.graph.unlink(from, &relation.property, child)?;
                self.add_dependant(to, relation, child)?;
            }
        }

        for (owner, relation) in self.catalog.incoming_references(&type_name)? {
            for candidate in self.local_of_type(&owner)? {
                if candidate == from
                    || !self.graph.targets(candidate, &relation.property)?.contains(&from)
                {
                    continue;
                }
                self.with_state_override(candidate, |session| {
                    session.rewrite_reference(candidate, &relation.property, from, to)
                })?;
            }
        }
        Ok(())
    }

    /// Runs `f` with `entity` temporarily forced to `Added`.
    ///
    /// The previous state and dirty flags are put back whether or not `f`
    /// succeeds.
    pub(crate) fn with_state_override<R>(
        &mut self,
        entity: EntityHandle,
        f: impl FnOnce(&mut Self) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let prior = self.tracker.state(entity);
        if prior == EntityState::Added {
            return f(self);
        }

        warn!(%entity, state = %prior, "overriding state to relink references");
        let flags = self.tracker.modified_properties(entity);
        self.tracker.set_state(entity, EntityState::Added)?;
        let result = f(self);
        let restored = self.restore_state(entity, prior, &flags);
        let value = result?;
        restored?;
        Ok(value)
    }

    fn restore_state(
        &mut self,
        entity: EntityHandle,
        state: EntityState,
        flags: &[String],
    ) -> CoreResult<()> {
        self.tracker.set_state(entity, state)?;
        if state != EntityState::Detached {
            for property in flags {
                self.tracker.set_modified(entity, property, true)?;
            }
        }
        Ok(())
    }

    /// Replaces `from` with `to` in one navigation property of `entity`.
    fn rewrite_reference(
        &mut self,
        entity: EntityHandle,
        property: &str,
        from: EntityHandle,
        to: EntityHandle,
    ) -> CoreResult<()> {
        self.tracker.check_reference_change(entity, property)?;
        match self.graph.get(entity)?.navigation(property) {
            Some(Navigation::Reference(Some(target))) if *target == from => {
                self.graph.set_reference(entity, property, Some(to))
            }
            Some(Navigation::Collection(items)) if items.contains(&from) => {
                self.graph.unlink(entity, property, from)?;
                self.graph.push_to_collection(entity, property, to)
            }
            _ => Ok(()),
        }
    }

    fn has_room(&self, owner: EntityHandle, relation: &NavigationRelation) -> CoreResult<bool> {
        Ok(relation.target_multiplicity == Multiplicity::Many
            || self.graph.targets(owner, &relation.property)?.is_empty())
    }

    fn add_dependant(
        &mut self,
        owner: EntityHandle,
        relation: &NavigationRelation,
        child: EntityHandle,
    ) -> CoreResult<()> {
        if relation.target_multiplicity == Multiplicity::Many {
            self.graph.push_to_collection(owner, &relation.property, child)
        } else {
            self.graph.set_reference(owner, &relation.property, Some(child))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CoreError;
    use crate::graph::{EntityGraph, EntityHandle, EntityRecord};
    use crate::schema::{Multiplicity, NavigationRelation, Schema, TypeSchema};
    use crate::session::Session;
    use crate::tracker::{EntityState, InMemoryTracker, Tracker};

    /// Order 1:* LineItem *:1 Product, where Product has no back collection.
    fn schema() -> Schema {
        Schema::new()
            .with_type(
                TypeSchema::new("Order")
                    .primary_key(["Id"])
                    .unique(["Number"])
                    .navigation(
                        NavigationRelation::to(
                            "Lines",
                            "LineItem",
                            Multiplicity::One,
                            Multiplicity::Many,
                        )
                        .keys(["OrderId"], ["Id"]),
                    ),
            )
            .with_type(TypeSchema::new("Product").primary_key(["Id"]).unique(["Sku"]))
            .with_type(
                TypeSchema::new("LineItem")
                    .primary_key(["Id"])
                    .properties(["Quantity"])
                    .navigation(
                        NavigationRelation::from(
                            "Order",
                            "Order",
                            Multiplicity::Many,
                            Multiplicity::One,
                        )
                        .keys(["OrderId"], ["Id"]),
                    )
                    .navigation(
                        NavigationRelation::from(
                            "Product",
                            "Product",
                            Multiplicity::Many,
                            Multiplicity::One,
                        )
                        .keys(["ProductId"], ["Id"]),
                    ),
            )
    }

    #[test]
    fn duplicate_product_is_merged_and_references_moved() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let order = graph.insert(EntityRecord::new("Order").with("Number", "A-1"));
        let p1 = graph.insert(EntityRecord::new("Product").with("Sku", "X"));
        let p2 = graph.insert(EntityRecord::new("Product").with("Sku", "X"));
        let l1 = graph.insert(EntityRecord::new("LineItem"));
        let l2 = graph.insert(EntityRecord::new("LineItem"));
        graph.link(l1, "Order", order, Some("Lines")).unwrap();
        graph.link(l2, "Order", order, Some("Lines")).unwrap();
        graph.set_reference(l1, "Product", Some(p1)).unwrap();
        graph.set_reference(l2, "Product", Some(p2)).unwrap();

        let mut tracker = InMemoryTracker::new();
        for h in [order, p1, p2, l1, l2] {
            tracker.attach(h, EntityState::Added).unwrap();
        }
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        assert_eq!(session.resolve_duplicates(p1).unwrap(), 1);

        assert_eq!(session.tracker().state(p2), EntityState::Detached);
        assert_eq!(session.graph().targets(l2, "Product").unwrap(), vec![p1]);
        // LineItems are not dependants of Product through a relation
        // Product owns, so they survive the merge.
        assert_eq!(session.tracker().state(l2), EntityState::Added);
    }

    #[test]
    fn duplicate_order_moves_lines_to_kept_order() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let keep = graph.insert(EntityRecord::new("Order").with("Number", "A-1"));
        let dup = graph.insert(EntityRecord::new("Order").with("Number", "A-1"));
        let line = graph.insert(EntityRecord::new("LineItem").with("Quantity", 2));
        graph.link(line, "Order", dup, Some("Lines")).unwrap();

        let mut tracker = InMemoryTracker::new();
        for h in [keep, dup, line] {
            tracker.attach(h, EntityState::Added).unwrap();
        }
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        assert_eq!(session.resolve_duplicates(keep).unwrap(), 1);

        assert_eq!(session.tracker().state(dup), EntityState::Detached);
        assert_eq!(session.tracker().state(line), EntityState::Added);
        assert_eq!(session.graph().targets(line, "Order").unwrap(), vec![keep]);
        assert_eq!(session.graph().targets(keep, "Lines").unwrap(), vec![line]);
        assert!(session.graph().targets(dup, "Lines").unwrap().is_empty());
    }

    /// A node may point at a twin of the same type, one to one.
    fn twin_schema() -> Schema {
        Schema::new().with_type(
            TypeSchema::new("Node")
                .primary_key(["Id"])
                .unique(["Code"])
                .navigation(
                    NavigationRelation::from(
                        "Twin",
                        "Node",
                        Multiplicity::ZeroOrOne,
                        Multiplicity::ZeroOrOne,
                    )
                    .keys(["TwinId"], ["Id"]),
                )
                .navigation(
                    NavigationRelation::to(
                        "TwinOf",
                        "Node",
                        Multiplicity::ZeroOrOne,
                        Multiplicity::ZeroOrOne,
                    )
                    .keys(["TwinId"], ["Id"]),
                ),
        )
    }

    fn twins() -> (EntityGraph, EntityHandle, EntityHandle) {
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Node").with("Code", "C"));
        let b = graph.insert(EntityRecord::new("Node").with("Code", "C"));
        graph.set_reference(a, "Twin", Some(b)).unwrap();
        (graph, a, b)
    }

    #[test]
    fn matches_sharing_a_principal_top_are_merged_directly() {
        let schema = twin_schema();
        let (mut graph, a, b) = twins();
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        assert_eq!(session.uppermost_principal_parent(a).unwrap(), b);

        session.define_state(a, true).unwrap();
        assert_eq!(session.tracker().state(a), EntityState::Detached);
        assert_eq!(session.tracker().state(b), EntityState::Added);
    }

    #[test]
    fn kept_instance_is_released_from_its_merged_principal() {
        let schema = twin_schema();
        let (mut graph, a, b) = twins();
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);

        session.define_state_many(&[a, b], false).unwrap();
        assert_eq!(session.tracker().state(a), EntityState::Added);
        assert_eq!(session.tracker().state(b), EntityState::Detached);
        assert!(session.graph().targets(a, "Twin").unwrap().is_empty());
    }

    #[test]
    fn no_identity_means_no_merge() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Order"));
        let b = graph.insert(EntityRecord::new("Order"));
        let mut tracker = InMemoryTracker::new();
        tracker.attach(a, EntityState::Added).unwrap();
        tracker.attach(b, EntityState::Added).unwrap();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        assert_eq!(session.resolve_duplicates(a).unwrap(), 0);
        assert_eq!(session.tracker().state(b), EntityState::Added);
    }

    #[test]
    fn override_restores_state_and_flags() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let line = graph.insert(EntityRecord::new("LineItem"));
        let mut tracker = InMemoryTracker::new();
        tracker.attach(line, EntityState::Unchanged).unwrap();
        tracker.set_modified(line, "Quantity", true).unwrap();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);

        let seen = session
            .with_state_override(line, |s| Ok(s.tracker.state(line)))
            .unwrap();
        assert_eq!(seen, EntityState::Added);
        assert_eq!(session.tracker().state(line), EntityState::Unchanged);
        assert!(session.tracker().is_modified(line, "Quantity"));

        let failed: Result<(), _> = session.with_state_override(line, |_| {
            Err(CoreError::invalid_input("boom"))
        });
        assert!(failed.is_err());
        assert_eq!(session.tracker().state(line), EntityState::Unchanged);
        assert!(session.tracker().is_modified(line, "Quantity"));
    }

    #[test]
    fn locked_dependant_is_relinked_under_override() {
        let schema = schema();
        let mut graph = EntityGraph::new();
        let keep = graph.insert(EntityRecord::new("Order").with("Number", "A-1"));
        let dup = graph.insert(EntityRecord::new("Order").with("Number", "A-1"));
        let line = graph.insert(EntityRecord::new("LineItem").with("Id", 3));
        graph.link(line, "Order", dup, Some("Lines")).unwrap();

        let mut tracker = InMemoryTracker::new();
        tracker.attach(keep, EntityState::Added).unwrap();
        tracker.attach(dup, EntityState::Added).unwrap();
        tracker.attach(line, EntityState::Unchanged).unwrap();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        session.relink_references(dup, keep).unwrap();

        assert_eq!(session.graph().targets(line, "Order").unwrap(), vec![keep]);
        assert_eq!(session.tracker().state(line), EntityState::Unchanged);
    }
}
