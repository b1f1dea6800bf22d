//! Scenario files: a schema, a named object graph and persisted rows.
//!
//! ```json
//! {
//!   "schema": { "types": [ ... ] },
//!   "entities": [
//!     { "name": "o1", "type": "Order", "values": { "Number": "A-1" },
//!       "collections": { "Lines": ["l1"] } },
//!     { "name": "l1", "type": "LineItem", "references": { "Order": "o1" } }
//!   ],
//!   "persisted": { "Product": [ { "Id": 7, "Sku": "X" } ] },
//!   "roots": ["o1"]
//! }
//! ```

use crate::error::{CliError, CliResult};
use entigraph_core::{
    EntityGraph, EntityHandle, EntityRecord, EntityState, InMemoryTracker, PersistedRow, Schema,
    Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// One named instance of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Name other entities refer to it by.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Initial tracking state; untracked when absent.
    #[serde(default)]
    pub state: Option<EntityState>,
    /// Scalar properties.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// To-one navigations, by target name.
    #[serde(default)]
    pub references: BTreeMap<String, String>,
    /// To-many navigations, by target names.
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<String>>,
}

/// A reconciliation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// The schema.
    pub schema: Schema,
    /// The object graph, in creation order.
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    /// Persisted rows per type.
    #[serde(default)]
    pub persisted: BTreeMap<String, Vec<PersistedRow>>,
    /// Entities to reconcile with their children; every tracked
    /// instance when empty.
    #[serde(default)]
    pub roots: Vec<String>,
}

/// A scenario turned into engine inputs.
#[derive(Debug)]
pub struct LoadedScenario {
    /// The schema.
    pub schema: Schema,
    /// The built graph.
    pub graph: EntityGraph,
    /// The tracker with initial states and persisted rows.
    pub tracker: InMemoryTracker,
    /// Handles of `roots`.
    pub roots: Vec<EntityHandle>,
    /// Entity names by handle.
    pub names: HashMap<EntityHandle, String>,
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    pub fn from_path(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a scenario from JSON.
    pub fn from_json(text: &str) -> CliResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the graph and tracker.
    pub fn load(self) -> CliResult<LoadedScenario> {
        let mut graph = EntityGraph::new();
        let mut tracker = InMemoryTracker::new();
        let mut handles: HashMap<String, EntityHandle> = HashMap::new();
        let mut names = HashMap::new();

        for spec in &self.entities {
            let mut record = EntityRecord::new(&spec.type_name);
            for (property, value) in &spec.values {
                record.set_value(property, value.clone());
            }
            let handle = graph.insert(record);
            if handles.insert(spec.name.clone(), handle).is_some() {
                return Err(CliError::DuplicateName {
                    name: spec.name.clone(),
                });
            }
            names.insert(handle, spec.name.clone());
            if let Some(state) = spec.state {
                tracker.attach(handle, state)?;
            }
        }

        let lookup = |name: &str| {
            handles.get(name).copied().ok_or_else(|| CliError::UnknownName {
                name: name.to_string(),
            })
        };
        for spec in &self.entities {
            let handle = lookup(&spec.name)?;
            for (property, target) in &spec.references {
                graph.set_reference(handle, property, Some(lookup(target)?))?;
            }
            for (property, targets) in &spec.collections {
                for target in targets {
                    graph.push_to_collection(handle, property, lookup(target)?)?;
                }
            }
        }

        for (type_name, rows) in self.persisted {
            for row in rows {
                tracker.add_persisted(type_name.clone(), row);
            }
        }

        let roots = self
            .roots
            .iter()
            .map(|name| lookup(name))
            .collect::<CliResult<Vec<_>>>()?;
        debug!(entities = graph.len(), roots = roots.len(), "scenario loaded");

        Ok(LoadedScenario {
            schema: self.schema,
            graph,
            tracker,
            roots,
            names,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use entigraph_core::Tracker;
    use entigraph_testkit::shop_schema;
    use std::io::Write;

    pub(crate) fn shop_scenario() -> Scenario {
        let entity = |name: &str, type_name: &str| EntitySpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            state: None,
            values: BTreeMap::new(),
            references: BTreeMap::new(),
            collections: BTreeMap::new(),
        };
        let mut order = entity("o1", "Order");
        order.values.insert("Number".into(), Value::from("A-1"));
        order.collections.insert("Lines".into(), vec!["l1".into(), "l2".into()]);
        let mut p1 = entity("p1", "Product");
        p1.values.insert("Sku".into(), Value::from("X"));
        let mut p2 = entity("p2", "Product");
        p2.values.insert("Sku".into(), Value::from("X"));
        let mut l1 = entity("l1", "LineItem");
        l1.references.insert("Order".into(), "o1".into());
        l1.references.insert("Product".into(), "p1".into());
        let mut l2 = entity("l2", "LineItem");
        l2.references.insert("Order".into(), "o1".into());
        l2.references.insert("Product".into(), "p2".into());

        Scenario {
            schema: shop_schema(),
            entities: vec![order, p1, p2, l1, l2],
            persisted: BTreeMap::new(),
            roots: vec!["o1".into()],
        }
    }

    #[test]
    fn loads_from_file() {
        let json = serde_json::to_string(&shop_scenario()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = Scenario::from_path(file.path()).unwrap().load().unwrap();
        assert_eq!(loaded.graph.len(), 5);
        assert_eq!(loaded.roots, vec![EntityHandle::new(0)]);
        assert_eq!(
            loaded.graph.targets(EntityHandle::new(0), "Lines").unwrap(),
            vec![EntityHandle::new(3), EntityHandle::new(4)]
        );
        assert!(loaded.tracker.local().is_empty());
    }

    #[test]
    fn dangling_reference_is_reported() {
        let mut scenario = shop_scenario();
        scenario.entities[3]
            .references
            .insert("Product".into(), "p9".into());
        let err = scenario.load().unwrap_err();
        assert!(matches!(err, CliError::UnknownName { name } if name == "p9"));
    }

    #[test]
    fn duplicate_name_is_reported() {
        let mut scenario = shop_scenario();
        scenario.entities[2].name = "p1".into();
        assert!(matches!(
            scenario.load(),
            Err(CliError::DuplicateName { .. })
        ));
    }

    #[test]
    fn parses_json_values_and_states() {
        let json = r#"{
            "schema": { "types": [ { "name": "Category", "primary_keys": ["Id"] } ] },
            "entities": [
                { "name": "c", "type": "Category", "state": "Unchanged",
                  "values": { "Id": 5, "Name": "Books" } }
            ],
            "persisted": { "Category": [ { "Id": 5, "Name": "Books" } ] }
        }"#;
        let loaded = Scenario::from_json(json).unwrap().load().unwrap();
        let c = EntityHandle::new(0);
        assert_eq!(loaded.tracker.state(c), EntityState::Unchanged);
        assert_eq!(loaded.graph.value(c, "Id").unwrap(), Value::Integer(5));
        assert_eq!(loaded.tracker.persisted("Category").len(), 1);
        assert!(loaded.roots.is_empty());
    }
}
