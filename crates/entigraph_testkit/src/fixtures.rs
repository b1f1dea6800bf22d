//! Fixture schemas and scenario helpers.
//!
//! Provides the shop schema (orders, line items, products, a category
//! tree) and a one-to-one chain schema, plus a harness that owns an
//! entity graph and an in-memory tracker.

use entigraph_core::{
    EntityGraph, EntityHandle, EntityRecord, EntityState, InMemoryTracker, Multiplicity,
    NavigationRelation, PersistedRow, Schema, Session, SessionConfig, Tracker, TypeSchema, Value,
};

/// Order 1:* LineItem *:1 Product *:0..1 Category, Category a tree.
///
/// Orders are identified by `Number`, products by `Sku`, line items by
/// the pair of their foreign keys.
pub fn shop_schema() -> Schema {
    Schema::new()
        .with_type(
            TypeSchema::new("Order")
                .primary_key(["Id"])
                .unique(["Number"])
                .properties(["Customer"])
                .navigation(
                    NavigationRelation::to("Lines", "LineItem", Multiplicity::One, Multiplicity::Many)
                        .keys(["OrderId"], ["Id"]),
                ),
        )
        .with_type(
            TypeSchema::new("LineItem")
                .primary_key(["Id"])
                .unique(["OrderId", "ProductId"])
                .properties(["Quantity"])
                .navigation(
                    NavigationRelation::from("Order", "Order", Multiplicity::Many, Multiplicity::One)
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
        .with_type(
            TypeSchema::new("Product")
                .primary_key(["Id"])
                .unique(["Sku"])
                .properties(["Name"])
                .navigation(
                    NavigationRelation::from(
                        "Category",
                        "Category",
                        Multiplicity::Many,
                        Multiplicity::ZeroOrOne,
                    )
                    .keys(["CategoryId"], ["Id"]),
                ),
        )
        .with_type(
            TypeSchema::new("Category")
                .primary_key(["Id"])
                .properties(["Name"])
                .navigation(
                    NavigationRelation::from(
                        "Parent",
                        "Category",
                        Multiplicity::Many,
                        Multiplicity::ZeroOrOne,
                    )
                    .keys(["ParentId"], ["Id"]),
                )
                .navigation(
                    NavigationRelation::to(
                        "Children",
                        "Category",
                        Multiplicity::ZeroOrOne,
                        Multiplicity::Many,
                    )
                    .keys(["ParentId"], ["Id"]),
                ),
        )
}

/// Person 1:0..1 Passport, sharing the primary key.
pub fn one_to_one_schema() -> Schema {
    Schema::new()
        .with_type(
            TypeSchema::new("Person")
                .primary_key(["Id"])
                .unique(["Email"])
                .properties(["Name"])
                .navigation(
                    NavigationRelation::to(
                        "Passport",
                        "Passport",
                        Multiplicity::One,
                        Multiplicity::ZeroOrOne,
                    )
                    .keys(["Id"], ["Id"]),
                ),
        )
        .with_type(
            TypeSchema::new("Passport")
                .primary_key(["Id"])
                .properties(["Number"])
                .navigation(
                    NavigationRelation::from(
                        "Person",
                        "Person",
                        Multiplicity::ZeroOrOne,
                        Multiplicity::One,
                    )
                    .keys(["Id"], ["Id"]),
                ),
        )
}

/// An order record with the given number.
pub fn order(number: &str) -> EntityRecord {
    EntityRecord::new("Order").with("Id", 0).with("Number", number)
}

/// A line item record.
pub fn line_item(quantity: i64) -> EntityRecord {
    EntityRecord::new("LineItem").with("Id", 0).with("Quantity", quantity)
}

/// A product record with the given SKU.
pub fn product(sku: &str) -> EntityRecord {
    EntityRecord::new("Product").with("Id", 0).with("Sku", sku)
}

/// A category record with the given name.
pub fn category(name: &str) -> EntityRecord {
    EntityRecord::new("Category").with("Id", 0).with("Name", name)
}

/// An entity graph and tracker owned together.
#[derive(Debug, Default)]
pub struct TestScenario {
    /// The entity graph.
    pub graph: EntityGraph,
    /// The tracker.
    pub tracker: InMemoryTracker,
}

impl TestScenario {
    /// Creates an empty scenario.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record without attaching it.
    pub fn add(&mut self, record: EntityRecord) -> EntityHandle {
        self.graph.insert(record)
    }

    /// Inserts a record and attaches it in `state`.
    pub fn add_tracked(&mut self, record: EntityRecord, state: EntityState) -> EntityHandle {
        let handle = self.graph.insert(record);
        self.tracker
            .attach(handle, state)
            .expect("Failed to attach instance");
        handle
    }

    /// Adds a row to the persisted snapshot.
    pub fn persist(&mut self, type_name: &str, columns: &[(&str, Value)]) {
        let row = columns
            .iter()
            .fold(PersistedRow::new(), |row, (name, value)| {
                row.with(*name, value.clone())
            });
        self.tracker.add_persisted(type_name, row);
    }

    /// Adds a line item to an order and points it at a product.
    pub fn add_line(
        &mut self,
        order: EntityHandle,
        product: EntityHandle,
        quantity: i64,
    ) -> EntityHandle {
        let line = self.add(line_item(quantity));
        self.graph
            .link(line, "Order", order, Some("Lines"))
            .expect("Failed to link line to order");
        self.graph
            .set_reference(line, "Product", Some(product))
            .expect("Failed to link line to product");
        line
    }

    /// Makes `child` a subcategory of `parent`.
    pub fn add_child_category(&mut self, parent: EntityHandle, child: EntityHandle) {
        self.graph
            .link(child, "Parent", parent, Some("Children"))
            .expect("Failed to link categories");
    }

    /// Returns the tracking state of an instance.
    pub fn state(&self, entity: EntityHandle) -> EntityState {
        self.tracker.state(entity)
    }

    /// Opens a session with the default configuration.
    pub fn session<'a>(&'a mut self, schema: &'a Schema) -> Session<'a, Schema, InMemoryTracker> {
        Session::new(schema, &mut self.graph, &mut self.tracker)
    }

    /// Opens a session with an explicit configuration.
    pub fn session_with<'a>(
        &'a mut self,
        schema: &'a Schema,
        config: SessionConfig,
    ) -> Session<'a, Schema, InMemoryTracker> {
        Session::with_config(schema, &mut self.graph, &mut self.tracker, config)
    }
}

/// Order with two line items pointing at two independently built
/// products that share a SKU.
pub struct DuplicateProducts {
    /// The scenario.
    pub scenario: TestScenario,
    /// The order.
    pub order: EntityHandle,
    /// The line items.
    pub lines: [EntityHandle; 2],
    /// The two product instances.
    pub products: [EntityHandle; 2],
}

/// Builds the duplicate-product order.
pub fn duplicate_products(sku: &str) -> DuplicateProducts {
    let mut scenario = TestScenario::new();
    let order = scenario.add(order("A-1"));
    let first = scenario.add(product(sku));
    let second = scenario.add(product(sku));
    let l1 = scenario.add_line(order, first, 1);
    let l2 = scenario.add_line(order, second, 2);
    DuplicateProducts {
        scenario,
        order,
        lines: [l1, l2],
        products: [first, second],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigraph_core::MetadataProvider;

    #[test]
    fn shop_schema_declares_every_type() {
        let schema = shop_schema();
        assert_eq!(
            schema.type_names(),
            vec!["Order", "LineItem", "Product", "Category"]
        );
        assert_eq!(schema.foreign_key_constraints().len(), 4);
    }

    #[test]
    fn duplicate_products_are_wired() {
        let fixture = duplicate_products("X");
        let graph = &fixture.scenario.graph;
        assert_eq!(
            graph.targets(fixture.order, "Lines").unwrap(),
            fixture.lines.to_vec()
        );
        assert_eq!(
            graph.targets(fixture.lines[1], "Product").unwrap(),
            vec![fixture.products[1]]
        );
    }

    #[test]
    fn persist_builds_rows() {
        let mut scenario = TestScenario::new();
        scenario.persist("Category", &[("Id", Value::from(5)), ("Name", Value::from("A"))]);
        let rows = scenario.tracker.persisted("Category");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("Name"), Value::from("A"));
    }
}
