//! Property-based test generators using proptest.
//!
//! Strategies produce plain descriptions of graphs; `build` methods turn
//! them into a [`TestScenario`] over the shop schema.

use crate::fixtures::{category, order, product, TestScenario};
use entigraph_core::EntityHandle;
use proptest::prelude::*;

/// Strategy for SKUs drawn from a small alphabet, so collisions are common.
pub fn sku_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-C]").expect("Invalid regex")
}

/// One order whose lines reference products by index.
#[derive(Debug, Clone)]
pub struct ShopSpec {
    /// SKU of each product instance; repeats are duplicates.
    pub products: Vec<String>,
    /// Product index of each line item.
    pub lines: Vec<usize>,
}

/// Handles of a built [`ShopSpec`].
#[derive(Debug, Clone)]
pub struct ShopHandles {
    /// The order.
    pub order: EntityHandle,
    /// Product instances, in generation order.
    pub products: Vec<EntityHandle>,
    /// Line items, in generation order.
    pub lines: Vec<EntityHandle>,
}

impl ShopSpec {
    /// Inserts the order, its products and its lines, untracked.
    pub fn build(&self, scenario: &mut TestScenario) -> ShopHandles {
        let order = scenario.add(order("A-1"));
        let products: Vec<_> = self
            .products
            .iter()
            .map(|sku| scenario.add(product(sku)))
            .collect();
        let lines = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, &p)| scenario.add_line(order, products[p], i as i64 + 1))
            .collect();
        ShopHandles {
            order,
            products,
            lines,
        }
    }
}

/// Strategy for an order with up to `max_products` products and
/// up to `max_lines` lines.
pub fn shop_spec_strategy(max_products: usize, max_lines: usize) -> impl Strategy<Value = ShopSpec> {
    prop::collection::vec(sku_strategy(), 1..=max_products.max(1)).prop_flat_map(move |products| {
        let count = products.len();
        prop::collection::vec(0..count, 1..=max_lines.max(1))
            .prop_map(move |lines| ShopSpec {
                products: products.clone(),
                lines,
            })
    })
}

/// A category forest: entry `i` names the parent of category `i`, which
/// is always an earlier category.
#[derive(Debug, Clone)]
pub struct CategoryForest {
    /// Parent index of each category.
    pub parents: Vec<Option<usize>>,
}

impl CategoryForest {
    /// Inserts the categories, wiring `Parent` and `Children`.
    pub fn build(&self, scenario: &mut TestScenario) -> Vec<EntityHandle> {
        let mut handles = Vec::with_capacity(self.parents.len());
        for (i, parent) in self.parents.iter().enumerate() {
            let node = scenario.add(category(&format!("c{i}")));
            if let Some(p) = parent {
                scenario.add_child_category(handles[*p], node);
            }
            handles.push(node);
        }
        handles
    }

    /// Returns the indices of `root` and every category below it.
    pub fn descendants_of(&self, root: usize) -> Vec<usize> {
        let mut found = vec![root];
        for (i, parent) in self.parents.iter().enumerate() {
            if let Some(p) = parent {
                if found.contains(p) {
                    found.push(i);
                }
            }
        }
        found
    }
}

/// Strategy for category forests of 1 to `max` categories.
pub fn category_forest_strategy(max: usize) -> impl Strategy<Value = CategoryForest> {
    prop::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 1..=max.max(1)).prop_map(
        |picks| {
            let parents = picks
                .iter()
                .enumerate()
                .map(|(i, (has_parent, pick))| (i > 0 && *has_parent).then(|| pick.index(i)))
                .collect();
            CategoryForest { parents }
        },
    )
}

/// Proptest settings sized for cases that build and reconcile a whole
/// graph.
#[must_use]
pub fn graph_case_config() -> ProptestConfig {
    ProptestConfig {
        cases: 48,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    }
}
