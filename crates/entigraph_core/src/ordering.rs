//! Processing order across and within types.

use crate::error::{CoreError, CoreResult};
use crate::graph::EntityHandle;
use crate::schema::MetadataProvider;
use crate::session::Session;
use crate::tracker::Tracker;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Orders type names so that principals come before their dependents.
///
/// Each type is ranked by the number of distinct types it depends on,
/// directly or transitively, through the given foreign keys (itself
/// excluded). Ties keep the order of `type_names`.
pub fn rank_types(
    type_names: &[String],
    constraints: impl IntoIterator<Item = (String, String)>,
) -> Vec<String> {
    let mut principals: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (dependent, principal) in constraints {
        principals.entry(dependent).or_default().insert(principal);
    }

    let mut ranked: Vec<(usize, &String)> = type_names
        .iter()
        .map(|name| (transitive_principals(name, &principals).len(), name))
        .collect();
    ranked.sort_by_key(|(count, _)| *count);
    ranked.into_iter().map(|(_, name)| name.clone()).collect()
}

fn transitive_principals(
    type_name: &str,
    principals: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![type_name.to_string()];
    while let Some(current) = stack.pop() {
        let Some(direct) = principals.get(&current) else {
            continue;
        };
        for principal in direct {
            if principal != type_name && seen.insert(principal.clone()) {
                stack.push(principal.clone());
            }
        }
    }
    seen
}

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'_, M, T> {
    /// Returns every declared type, principals before dependents.
    pub fn type_processing_order(&mut self) -> CoreResult<Vec<String>> {
        let metadata = self.catalog.metadata();
        let order = rank_types(
            &metadata.type_names(),
            metadata
                .foreign_key_constraints()
                .into_iter()
                .map(|fk| (fk.dependent_type, fk.principal_type)),
        );
        debug!(types = ?order, "type processing order");
        Ok(order)
    }

    /// Orders instances of one type so that tree parents come first.
    ///
    /// Types without a self-referencing relation keep the input order.
    /// Otherwise instances are stably sorted by their number of ancestors
    /// through that relation.
    pub fn within_type_order(&mut self, instances: &[EntityHandle]) -> CoreResult<Vec<EntityHandle>> {
        let Some(&first) = instances.first() else {
            return Ok(Vec::new());
        };
        let type_name = self.type_of(first)?;
        for &entity in &instances[1..] {
            let other = self.graph.type_name(entity)?;
            if other != type_name {
                return Err(CoreError::mixed_type(type_name, other));
            }
        }

        let Some(relation) = self.catalog.self_relation(&type_name)? else {
            return Ok(instances.to_vec());
        };
        let label = format!("{type_name}.{}", relation.property);

        let mut keyed = Vec::with_capacity(instances.len());
        for &entity in instances {
            let depth = self.self_ancestor_count(entity, &relation.property, &label)?;
            keyed.push((depth, entity));
        }
        keyed.sort_by_key(|(depth, _)| *depth);
        Ok(keyed.into_iter().map(|(_, entity)| entity).collect())
    }

    /// Number of ancestors reached by repeatedly following `property`.
    fn self_ancestor_count(
        &mut self,
        entity: EntityHandle,
        property: &str,
        label: &str,
    ) -> CoreResult<usize> {
        let mut path = Vec::new();
        let mut current = Some(entity);
        let known = loop {
            let Some(node) = current else {
                break None;
            };
            if let Some(&count) = self.memo.self_ancestors.get(&node) {
                break Some(count);
            }
            if path.contains(&node) {
                return Err(CoreError::cycle_detected(node, label));
            }
            path.push(node);
            current = self.graph.targets(node, property)?.first().copied();
        };

        // `known` belongs to the parent of the last node on the path.
        let mut count = known.map_or(0, |c| c + 1);
        for node in path.into_iter().rev() {
            self.memo.self_ancestors.insert(node, count);
            count += 1;
        }
        Ok(self.memo.self_ancestors.get(&entity).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityGraph, EntityRecord};
    use crate::schema::{Multiplicity, NavigationRelation, Schema, TypeSchema};
    use crate::tracker::InMemoryTracker;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fk(dependent: &str, principal: &str) -> (String, String) {
        (dependent.to_string(), principal.to_string())
    }

    fn category_schema() -> Schema {
        Schema::new()
            .with_type(
                TypeSchema::new("Category").primary_key(["Id"]).navigation(
                    NavigationRelation::from(
                        "Parent",
                        "Category",
                        Multiplicity::Many,
                        Multiplicity::ZeroOrOne,
                    )
                    .keys(["ParentId"], ["Id"]),
                ),
            )
            .with_type(TypeSchema::new("Tag").primary_key(["Id"]))
    }

    #[test]
    fn principals_rank_first() {
        let types = names(&["LineItem", "Order", "Product", "Category"]);
        let order = rank_types(
            &types,
            [
                fk("LineItem", "Order"),
                fk("LineItem", "Product"),
                fk("Product", "Category"),
                fk("Category", "Category"),
            ],
        );
        assert_eq!(order, names(&["Order", "Category", "Product", "LineItem"]));
    }

    #[test]
    fn ties_keep_declaration_order() {
        let types = names(&["B", "A", "C"]);
        assert_eq!(rank_types(&types, Vec::new()), types);
    }

    #[test]
    fn tree_parents_come_first() {
        let schema = category_schema();
        let mut graph = EntityGraph::new();
        let leaf = graph.insert(EntityRecord::new("Category"));
        let mid = graph.insert(EntityRecord::new("Category"));
        let root = graph.insert(EntityRecord::new("Category"));
        graph.set_reference(leaf, "Parent", Some(mid)).unwrap();
        graph.set_reference(mid, "Parent", Some(root)).unwrap();
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);

        let order = session.within_type_order(&[leaf, mid, root]).unwrap();
        assert_eq!(order, vec![root, mid, leaf]);
    }

    #[test]
    fn types_without_self_relation_keep_input_order() {
        let schema = category_schema();
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Tag"));
        let b = graph.insert(EntityRecord::new("Tag"));
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        assert_eq!(session.within_type_order(&[b, a]).unwrap(), vec![b, a]);
    }

    #[test]
    fn mixed_batch_fails() {
        let schema = category_schema();
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Category"));
        let b = graph.insert(EntityRecord::new("Tag"));
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        let err = session.within_type_order(&[a, b]).unwrap_err();
        assert!(matches!(err, CoreError::MixedType { .. }));
    }

    #[test]
    fn parent_cycle_fails() {
        let schema = category_schema();
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Category"));
        let b = graph.insert(EntityRecord::new("Category"));
        graph.set_reference(a, "Parent", Some(b)).unwrap();
        graph.set_reference(b, "Parent", Some(a)).unwrap();
        let mut tracker = InMemoryTracker::new();
        let mut session = Session::new(&schema, &mut graph, &mut tracker);
        let err = session.within_type_order(&[a, b]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cycle detected through entity:0 while following Category.Parent"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn every_principal_precedes_its_dependents(
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..16)
        ) {
            // Edges only point to lower indices, so the type graph is acyclic.
            let types: Vec<String> = (0..8).map(|i| format!("T{i}")).collect();
            let constraints: Vec<(String, String)> = edges
                .iter()
                .filter(|(a, b)| a > b)
                .map(|&(a, b)| (types[a].clone(), types[b].clone()))
                .collect();
            let order = rank_types(&types, constraints.clone());
            prop_assert_eq!(order.len(), types.len());
            for (dependent, principal) in &constraints {
                let d = order.iter().position(|t| t == dependent);
                let p = order.iter().position(|t| t == principal);
                prop_assert!(p < d);
            }
        }

        #[test]
        fn random_trees_order_parents_first(parents in prop::collection::vec(any::<prop::sample::Index>(), 1..24)) {
            let schema = category_schema();
            let mut graph = EntityGraph::new();
            let mut nodes = Vec::new();
            for (i, pick) in parents.iter().enumerate() {
                let node = graph.insert(EntityRecord::new("Category"));
                if i > 0 {
                    let parent = nodes[pick.index(i)];
                    graph.set_reference(node, "Parent", Some(parent)).unwrap();
                }
                nodes.push(node);
            }
            let mut shuffled = nodes.clone();
            shuffled.reverse();
            let mut tracker = InMemoryTracker::new();
            let mut session = Session::new(&schema, &mut graph, &mut tracker);
            let order = session.within_type_order(&shuffled).unwrap();
            for &node in &nodes {
                if let Some(parent) = session.graph().targets(node, "Parent").unwrap().first() {
                    let n = order.iter().position(|h| *h == node);
                    let p = order.iter().position(|h| h == parent);
                    prop_assert!(p < n);
                }
            }
        }
    }
}
