//! Arena of entity instances.

use crate::error::{CoreError, CoreResult};
use crate::graph::EntityHandle;
use crate::value::Value;
use std::collections::BTreeMap;

/// Value of a navigation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// A to-one reference, possibly unset.
    Reference(Option<EntityHandle>),
    /// A to-many collection, in caller order.
    Collection(Vec<EntityHandle>),
}

impl Navigation {
    /// Returns the related instances, in order.
    pub fn targets(&self) -> Vec<EntityHandle> {
        match self {
            Navigation::Reference(target) => target.iter().copied().collect(),
            Navigation::Collection(items) => items.clone(),
        }
    }

    /// Returns true if `entity` is among the related instances.
    pub fn contains(&self, entity: EntityHandle) -> bool {
        match self {
            Navigation::Reference(target) => *target == Some(entity),
            Navigation::Collection(items) => items.contains(&entity),
        }
    }

    /// Returns true for a to-one reference.
    pub fn is_reference(&self) -> bool {
        matches!(self, Navigation::Reference(_))
    }
}

/// A single instance of some declared type.
///
/// Records are dynamic: the type name selects the schema entry, scalar
/// properties live in `values` and relationships in `navigations`. A
/// scalar that was never set reads as [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    type_name: String,
    values: BTreeMap<String, Value>,
    navigations: BTreeMap<String, Navigation>,
}

impl EntityRecord {
    /// Creates an empty record of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: BTreeMap::new(),
            navigations: BTreeMap::new(),
        }
    }

    /// Sets a scalar property (builder form).
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    /// Returns the declared type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns a scalar property, `Null` when unset.
    pub fn value(&self, property: &str) -> Value {
        self.values.get(property).cloned().unwrap_or(Value::Null)
    }

    /// Sets a scalar property.
    pub fn set_value(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(property.into(), value.into());
    }

    /// Returns all set scalar properties.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Returns a navigation property, if it was ever set.
    pub fn navigation(&self, property: &str) -> Option<&Navigation> {
        self.navigations.get(property)
    }

    /// Returns all navigation properties.
    pub fn navigations(&self) -> impl Iterator<Item = (&str, &Navigation)> {
        self.navigations.iter().map(|(name, nav)| (name.as_str(), nav))
    }
}

/// Arena owning every instance of one caller-built object graph.
///
/// The caller creates instances and wires their navigation properties;
/// the reconciliation engine reads them and, during duplicate merging,
/// rewires navigation properties of instances that stay.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    records: Vec<EntityRecord>,
}

impl EntityGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance and returns its handle.
    pub fn insert(&mut self, record: EntityRecord) -> EntityHandle {
        let handle = EntityHandle::new(self.records.len() as u32);
        self.records.push(record);
        handle
    }

    /// Returns the number of instances.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the graph holds no instance.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if `entity` refers to an instance of this graph.
    pub fn contains(&self, entity: EntityHandle) -> bool {
        entity.index() < self.records.len()
    }

    /// Returns every handle in creation order.
    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> {
        (0..self.records.len() as u32).map(EntityHandle::new)
    }

    /// Returns the record behind a handle.
    pub fn get(&self, entity: EntityHandle) -> CoreResult<&EntityRecord> {
        self.records
            .get(entity.index())
            .ok_or_else(|| CoreError::unknown_entity(entity))
    }

    /// Returns the record behind a handle, mutably.
    pub fn get_mut(&mut self, entity: EntityHandle) -> CoreResult<&mut EntityRecord> {
        self.records
            .get_mut(entity.index())
            .ok_or_else(|| CoreError::unknown_entity(entity))
    }

    /// Returns the type name of an instance.
    pub fn type_name(&self, entity: EntityHandle) -> CoreResult<&str> {
        Ok(self.get(entity)?.type_name())
    }

    /// Returns a scalar property of an instance.
    pub fn value(&self, entity: EntityHandle, property: &str) -> CoreResult<Value> {
        Ok(self.get(entity)?.value(property))
    }

    /// Sets a scalar property of an instance.
    pub fn set_value(
        &mut self,
        entity: EntityHandle,
        property: &str,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        self.get_mut(entity)?.set_value(property, value);
        Ok(())
    }

    /// Returns the related instances behind a navigation property.
    ///
    /// An unset navigation yields nothing.
    pub fn targets(&self, entity: EntityHandle, property: &str) -> CoreResult<Vec<EntityHandle>> {
        Ok(self
            .get(entity)?
            .navigation(property)
            .map(Navigation::targets)
            .unwrap_or_default())
    }

    /// Sets a to-one navigation property.
    pub fn set_reference(
        &mut self,
        entity: EntityHandle,
        property: &str,
        target: Option<EntityHandle>,
    ) -> CoreResult<()> {
        self.check_target(target)?;
        self.get_mut(entity)?
            .navigations
            .insert(property.to_string(), Navigation::Reference(target));
        Ok(())
    }

    /// Appends to a to-many navigation property, ignoring repeats.
    ///
    /// An unset navigation becomes a collection.
    pub fn push_to_collection(
        &mut self,
        entity: EntityHandle,
        property: &str,
        item: EntityHandle,
    ) -> CoreResult<()> {
        self.check_target(Some(item))?;
        let nav = self
            .get_mut(entity)?
            .navigations
            .entry(property.to_string())
            .or_insert_with(|| Navigation::Collection(Vec::new()));
        match nav {
            Navigation::Collection(items) => {
                if !items.contains(&item) {
                    items.push(item);
                }
                Ok(())
            }
            Navigation::Reference(_) => Err(CoreError::invalid_input(format!(
                "{property} on {entity} is a reference, not a collection"
            ))),
        }
    }

    /// Removes `item` from a navigation property.
    ///
    /// A reference pointing at `item` is cleared; a collection loses every
    /// occurrence. Returns true if anything changed.
    pub fn unlink(
        &mut self,
        entity: EntityHandle,
        property: &str,
        item: EntityHandle,
    ) -> CoreResult<bool> {
        let Some(nav) = self.get_mut(entity)?.navigations.get_mut(property) else {
            return Ok(false);
        };
        let changed = match nav {
            Navigation::Reference(target) if *target == Some(item) => {
                *target = None;
                true
            }
            Navigation::Reference(_) => false,
            Navigation::Collection(items) => {
                let before = items.len();
                items.retain(|h| *h != item);
                before != items.len()
            }
        };
        Ok(changed)
    }

    /// Wires a dependent to its principal.
    ///
    /// Sets `reference` on the dependent and, when given, appends the
    /// dependent to `collection` on the principal.
    pub fn link(
        &mut self,
        dependent: EntityHandle,
        reference: &str,
        principal: EntityHandle,
        collection: Option<&str>,
    ) -> CoreResult<()> {
        self.set_reference(dependent, reference, Some(principal))?;
        if let Some(collection) = collection {
            self.push_to_collection(principal, collection, dependent)?;
        }
        Ok(())
    }

    fn check_target(&self, target: Option<EntityHandle>) -> CoreResult<()> {
        match target {
            Some(t) if !self.contains(t) => Err(CoreError::unknown_entity(t)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_allocates_sequential_handles() {
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Order"));
        let b = graph.insert(EntityRecord::new("Order"));
        assert_eq!(a, EntityHandle::new(0));
        assert_eq!(b, EntityHandle::new(1));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn unset_scalar_reads_null() {
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Order").with("Id", 3));
        assert_eq!(graph.value(a, "Id").unwrap(), Value::Integer(3));
        assert_eq!(graph.value(a, "Note").unwrap(), Value::Null);
    }

    #[test]
    fn unknown_handle_is_invalid_input() {
        let graph = EntityGraph::new();
        let err = graph.get(EntityHandle::new(9)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[test]
    fn link_sets_both_sides() {
        let mut graph = EntityGraph::new();
        let order = graph.insert(EntityRecord::new("Order"));
        let line = graph.insert(EntityRecord::new("LineItem"));
        graph.link(line, "Order", order, Some("Lines")).unwrap();
        assert_eq!(graph.targets(line, "Order").unwrap(), vec![order]);
        assert_eq!(graph.targets(order, "Lines").unwrap(), vec![line]);

        // Linking again does not duplicate the collection entry.
        graph.link(line, "Order", order, Some("Lines")).unwrap();
        assert_eq!(graph.targets(order, "Lines").unwrap().len(), 1);
    }

    #[test]
    fn unlink_reference_and_collection() {
        let mut graph = EntityGraph::new();
        let order = graph.insert(EntityRecord::new("Order"));
        let line = graph.insert(EntityRecord::new("LineItem"));
        graph.link(line, "Order", order, Some("Lines")).unwrap();

        assert!(graph.unlink(order, "Lines", line).unwrap());
        assert!(graph.unlink(line, "Order", order).unwrap());
        assert!(!graph.unlink(line, "Order", order).unwrap());
        assert!(graph.targets(order, "Lines").unwrap().is_empty());
        assert!(graph.targets(line, "Order").unwrap().is_empty());
    }

    #[test]
    fn push_onto_reference_fails() {
        let mut graph = EntityGraph::new();
        let a = graph.insert(EntityRecord::new("Category"));
        let b = graph.insert(EntityRecord::new("Category"));
        graph.set_reference(a, "Parent", Some(b)).unwrap();
        assert!(graph.push_to_collection(a, "Parent", b).is_err());
    }
}
