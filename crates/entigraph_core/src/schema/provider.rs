//! Metadata provider and the in-memory schema catalog.

use crate::error::{CoreError, CoreResult};
use crate::schema::{Direction, ForeignKeyConstraint, NavigationDetail, NavigationRelation};
use serde::{Deserialize, Serialize};

/// Read-only source of schema metadata.
///
/// The reconciliation engine never introspects instances to learn their
/// shape; everything type-specific comes through this trait.
pub trait MetadataProvider {
    /// Returns every declared type name, in declaration order.
    fn type_names(&self) -> Vec<String>;

    /// Returns the navigation relations of a type.
    fn relations_of(&self, type_name: &str) -> CoreResult<NavigationDetail>;

    /// Returns every foreign-key constraint of the schema.
    fn foreign_key_constraints(&self) -> Vec<ForeignKeyConstraint>;

    /// Returns the primary-key property names of a type.
    fn primary_keys_of(&self, type_name: &str) -> CoreResult<Vec<String>>;

    /// Returns the unique property combination of a type (may be empty).
    fn unique_properties_of(&self, type_name: &str) -> CoreResult<Vec<String>>;

    /// Returns the scalar property names of a type.
    fn scalar_properties_of(&self, type_name: &str) -> CoreResult<Vec<String>>;
}

/// Declaration of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Type name.
    pub name: String,
    /// Primary-key properties.
    #[serde(default)]
    pub primary_keys: Vec<String>,
    /// Unique property combination.
    #[serde(default)]
    pub unique: Vec<String>,
    /// Scalar properties (keys included).
    #[serde(default)]
    pub properties: Vec<String>,
    /// Navigation relations, in declaration order.
    #[serde(default)]
    pub navigations: Vec<NavigationRelation>,
}

impl TypeSchema {
    /// Creates an empty type declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_keys: Vec::new(),
            unique: Vec::new(),
            properties: Vec::new(),
            navigations: Vec::new(),
        }
    }

    /// Declares the primary key; key properties are added as scalars.
    #[must_use]
    pub fn primary_key<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        for key in self.primary_keys.clone() {
            self.add_property(key);
        }
        self
    }

    /// Declares the unique combination; its properties are added as scalars.
    #[must_use]
    pub fn unique<I>(mut self, properties: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.unique = properties.into_iter().map(Into::into).collect();
        for property in self.unique.clone() {
            self.add_property(property);
        }
        self
    }

    /// Declares scalar properties.
    #[must_use]
    pub fn properties<I>(mut self, properties: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for property in properties {
            self.add_property(property.into());
        }
        self
    }

    /// Declares a navigation relation.
    ///
    /// The foreign-key columns of a `From` relation are added as scalars.
    #[must_use]
    pub fn navigation(mut self, relation: NavigationRelation) -> Self {
        if relation.direction == Direction::From {
            for key in relation.from_keys.clone() {
                self.add_property(key);
            }
        }
        self.navigations.push(relation);
        self
    }

    fn add_property(&mut self, property: String) {
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
    }
}

/// In-memory schema catalog.
///
/// Foreign-key constraints may be declared explicitly; when none are,
/// they are derived from the `From` relations of every type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Declared types, in declaration order.
    pub types: Vec<TypeSchema>,
    /// Explicit foreign-key constraints.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyConstraint>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type declaration (builder form).
    #[must_use]
    pub fn with_type(mut self, ty: TypeSchema) -> Self {
        self.types.push(ty);
        self
    }

    /// Adds an explicit foreign-key constraint (builder form).
    #[must_use]
    pub fn with_foreign_key(mut self, fk: ForeignKeyConstraint) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Parses a schema from its JSON form.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Looks up a type declaration.
    pub fn find(&self, type_name: &str) -> CoreResult<&TypeSchema> {
        self.types
            .iter()
            .find(|t| t.name == type_name)
            .ok_or_else(|| CoreError::metadata_missing(type_name))
    }

    fn derived_foreign_keys(&self) -> Vec<ForeignKeyConstraint> {
        let mut constraints: Vec<ForeignKeyConstraint> = Vec::new();
        for ty in &self.types {
            for relation in ty.navigations.iter().filter(|r| r.direction == Direction::From) {
                let fk = ForeignKeyConstraint {
                    principal_type: relation.partner_type.clone(),
                    principal_keys: relation.to_keys.clone(),
                    dependent_type: ty.name.clone(),
                    dependent_keys: relation.from_keys.clone(),
                };
                if !constraints.contains(&fk) {
                    constraints.push(fk);
                }
            }
        }
        constraints
    }
}

impl MetadataProvider for Schema {
    fn type_names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    fn relations_of(&self, type_name: &str) -> CoreResult<NavigationDetail> {
        let ty = self.find(type_name)?;
        Ok(NavigationDetail::new(&ty.name, ty.navigations.clone()))
    }

    fn foreign_key_constraints(&self) -> Vec<ForeignKeyConstraint> {
        if self.foreign_keys.is_empty() {
            self.derived_foreign_keys()
        } else {
            self.foreign_keys.clone()
        }
    }

    fn primary_keys_of(&self, type_name: &str) -> CoreResult<Vec<String>> {
        Ok(self.find(type_name)?.primary_keys.clone())
    }

    fn unique_properties_of(&self, type_name: &str) -> CoreResult<Vec<String>> {
        Ok(self.find(type_name)?.unique.clone())
    }

    fn scalar_properties_of(&self, type_name: &str) -> CoreResult<Vec<String>> {
        Ok(self.find(type_name)?.properties.clone())
    }
}
