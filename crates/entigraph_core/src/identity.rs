//! Identity resolution: which instances denote the same row.

use crate::error::CoreResult;
use crate::graph::EntityHandle;
use crate::schema::MetadataProvider;
use crate::session::Session;
use crate::tracker::{PersistedRow, Tracker};
use crate::value::Value;

/// Where an identity filter's criteria come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// The primary key carries at least one assigned value.
    PrimaryKey,
    /// The primary key is unassigned; the unique combination is used.
    Unique,
}

/// Equality predicate over instances of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFilter {
    /// Type the filter applies to.
    pub type_name: String,
    /// Source of the criteria.
    pub kind: IdentityKind,
    /// Property values that must all match.
    pub criteria: Vec<(String, Value)>,
}

impl IdentityFilter {
    /// Returns true if a persisted row satisfies every criterion.
    pub fn matches_row(&self, row: &PersistedRow) -> bool {
        self.criteria
            .iter()
            .all(|(column, value)| row.value(column) == *value)
    }
}

impl<M: MetadataProvider + ?Sized, T: Tracker + ?Sized> Session<'_, M, T> {
    /// Builds the identity filter of an instance.
    ///
    /// Uses the primary key if any key property is not at its default
    /// and none resolves to `Null`, otherwise the declared unique
    /// combination. Returns `None` when neither applies, including when a
    /// unique value is `Null`.
    pub fn identity_filter(&mut self, entity: EntityHandle) -> CoreResult<Option<IdentityFilter>> {
        let type_name = self.type_of(entity)?;
        let metadata = self.catalog.metadata();

        let keys = metadata.primary_keys_of(&type_name)?;
        let key_values = self.resolved_values(entity, &keys)?;
        if key_values.iter().any(|(_, v)| !v.is_default())
            && !key_values.iter().any(|(_, v)| v.is_null())
        {
            return Ok(Some(IdentityFilter {
                type_name,
                kind: IdentityKind::PrimaryKey,
                criteria: key_values,
            }));
        }

        let unique = metadata.unique_properties_of(&type_name)?;
        if unique.is_empty() {
            return Ok(None);
        }
        let unique_values = self.resolved_values(entity, &unique)?;
        if unique_values.iter().any(|(_, v)| v.is_null()) {
            return Ok(None);
        }
        Ok(Some(IdentityFilter {
            type_name,
            kind: IdentityKind::Unique,
            criteria: unique_values,
        }))
    }

    /// Returns true if a pending instance satisfies the filter.
    pub fn matches_instance(
        &mut self,
        filter: &IdentityFilter,
        candidate: EntityHandle,
    ) -> CoreResult<bool> {
        if self.graph.type_name(candidate)? != filter.type_name {
            return Ok(false);
        }
        for (property, value) in &filter.criteria {
            if self.resolved_value(candidate, property)? != *value {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns the first persisted row with the same identity.
    pub fn matching_persisted(&mut self, entity: EntityHandle) -> CoreResult<Option<PersistedRow>> {
        let Some(filter) = self.identity_filter(entity)? else {
            return Ok(None);
        };
        Ok(self
            .tracker
            .persisted(&filter.type_name)
            .iter()
            .find(|row| filter.matches_row(row))
            .cloned())
    }

    /// Reads a scalar property the way the store will see it.
    ///
    /// A foreign-key column whose navigation is set takes its value from
    /// the referenced principal's key; a principal whose key is still at
    /// default yields `Null`, since the store has not generated it yet.
    pub fn resolved_value(&mut self, entity: EntityHandle, property: &str) -> CoreResult<Value> {
        let mut current = entity;
        let mut column = property.to_string();
        // Each hop moves to a principal; a chain longer than the graph loops.
        for _ in 0..=self.graph.len() {
            let Some((principal, key)) = self.foreign_key_source(current, &column)? else {
                return self.graph.value(current, &column);
            };
            let value = self.graph.value(principal, &key)?;
            if self.foreign_key_source(principal, &key)?.is_none() {
                return Ok(if value.is_default() { Value::Null } else { value });
            }
            current = principal;
            column = key;
        }
        self.graph.value(entity, property)
    }

    fn resolved_values(
        &mut self,
        entity: EntityHandle,
        properties: &[String],
    ) -> CoreResult<Vec<(String, Value)>> {
        properties
            .iter()
            .map(|p| Ok((p.clone(), self.resolved_value(entity, p)?)))
            .collect()
    }

    /// Finds the principal and key column a foreign-key column is bound to.
    fn foreign_key_source(
        &mut self,
        entity: EntityHandle,
        column: &str,
    ) -> CoreResult<Option<(EntityHandle, String)>> {
        let type_name = self.type_of(entity)?;
        let detail = self.catalog.relations_of(&type_name)?;
        for relation in detail.from_relations() {
            let Some(index) = relation.from_keys.iter().position(|k| k == column) else {
                continue;
            };
            let Some(key) = relation.to_keys.get(index) else {
                continue;
            };
            let record = self.graph.get(entity)?;
            if let Some(principal) = record
                .navigation(&relation.property)
                .filter(|nav| nav.is_reference())
                .and_then(|nav| nav.targets().first().copied())
            {
                return Ok(Some((principal, key.clone())));
            }
        }
        Ok(None)
    }
}
