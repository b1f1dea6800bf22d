//! Invariant checkers for reconciled graphs.
//!
//! Each checker returns a list of violations rather than panicking, so
//! property tests can report them with `prop_assert!`.

use entigraph_core::{
    CoreResult, EntityGraph, EntityHandle, EntityState, IdentityFilter, InMemoryTracker,
    MetadataProvider, Schema, Session, Tracker,
};

/// Returns every pair of distinct pending instances of `type_name` that
/// share an identity.
pub fn duplicate_identities(
    schema: &Schema,
    graph: &mut EntityGraph,
    tracker: &mut InMemoryTracker,
    type_name: &str,
) -> CoreResult<Vec<(EntityHandle, EntityHandle)>> {
    let pending: Vec<EntityHandle> = tracker
        .local()
        .into_iter()
        .filter(|h| graph.type_name(*h).is_ok_and(|t| t == type_name))
        .collect();

    let mut session = Session::new(schema, graph, tracker);
    let mut filters: Vec<(EntityHandle, IdentityFilter)> = Vec::new();
    for &entity in &pending {
        if let Some(filter) = session.identity_filter(entity)? {
            filters.push((entity, filter));
        }
    }

    let mut pairs = Vec::new();
    for (i, (a, fa)) in filters.iter().enumerate() {
        for (b, fb) in &filters[i + 1..] {
            if fa.criteria == fb.criteria {
                pairs.push((*a, *b));
            }
        }
    }
    Ok(pairs)
}

/// Returns every instance in `order` that appears before its parent
/// through `property`.
pub fn parents_out_of_order(
    graph: &EntityGraph,
    order: &[EntityHandle],
    property: &str,
) -> Vec<EntityHandle> {
    let position = |h: &EntityHandle| order.iter().position(|o| o == h);
    order
        .iter()
        .filter(|child| {
            graph
                .targets(**child, property)
                .unwrap_or_default()
                .first()
                .is_some_and(|parent| match (position(parent), position(*child)) {
                    (Some(p), Some(c)) => p > c,
                    _ => false,
                })
        })
        .copied()
        .collect()
}

/// Returns every type that comes before one of its principals in `order`.
pub fn principals_out_of_order(schema: &Schema, order: &[String]) -> Vec<String> {
    let position = |name: &str| order.iter().position(|o| o == name);
    schema
        .foreign_key_constraints()
        .into_iter()
        .filter(|fk| fk.dependent_type != fk.principal_type)
        .filter(|fk| match (position(&fk.principal_type), position(&fk.dependent_type)) {
            (Some(p), Some(d)) => p > d,
            _ => true,
        })
        .map(|fk| fk.dependent_type)
        .collect()
}

/// Returns every listed instance that is still tracked.
pub fn still_tracked<T: Tracker>(tracker: &T, expected_detached: &[EntityHandle]) -> Vec<EntityHandle> {
    expected_detached
        .iter()
        .copied()
        .filter(|h| tracker.state(*h) != EntityState::Detached)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{category, product, shop_schema, TestScenario};

    #[test]
    fn reports_duplicate_skus() {
        let schema = shop_schema();
        let mut scenario = TestScenario::new();
        let a = scenario.add_tracked(product("X"), EntityState::Added);
        let b = scenario.add_tracked(product("X"), EntityState::Added);
        scenario.add_tracked(product("Y"), EntityState::Added);
        let pairs =
            duplicate_identities(&schema, &mut scenario.graph, &mut scenario.tracker, "Product")
                .unwrap();
        assert_eq!(pairs, vec![(a, b)]);
    }

    #[test]
    fn reports_child_before_parent() {
        let mut scenario = TestScenario::new();
        let root = scenario.add(category("root"));
        let child = scenario.add(category("child"));
        scenario.add_child_category(root, child);
        assert_eq!(
            parents_out_of_order(&scenario.graph, &[child, root], "Parent"),
            vec![child]
        );
        assert!(parents_out_of_order(&scenario.graph, &[root, child], "Parent").is_empty());
    }

    #[test]
    fn shop_order_has_principals_first() {
        let schema = shop_schema();
        let order: Vec<String> = ["Order", "Category", "Product", "LineItem"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(principals_out_of_order(&schema, &order).is_empty());
        let reversed: Vec<String> = order.iter().rev().cloned().collect();
        assert!(!principals_out_of_order(&schema, &reversed).is_empty());
    }
}
