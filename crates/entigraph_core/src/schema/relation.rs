//! Navigation relation metadata.

use serde::{Deserialize, Serialize};

/// Which side of a relationship a navigation property sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The owning type is the dependent; the property points at the principal.
    From,
    /// The owning type is the principal; the property points at dependents.
    To,
}

/// Cardinality of one end of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    /// Exactly one.
    One,
    /// Zero or one.
    ZeroOrOne,
    /// Zero or more.
    Many,
}

impl Multiplicity {
    /// Returns true for `One` and `ZeroOrOne`.
    pub const fn is_to_one(self) -> bool {
        matches!(self, Multiplicity::One | Multiplicity::ZeroOrOne)
    }
}

/// One navigation property of a declared type.
///
/// `source_multiplicity` is the cardinality at the owning type's end,
/// `target_multiplicity` the cardinality at the partner's end. Key lists
/// name the foreign-key columns on the dependent (`from_keys`) and the
/// referenced columns on the principal (`to_keys`), whichever side owns
/// the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRelation {
    /// Navigation property name on the owning type.
    pub property: String,
    /// Type at the other end.
    pub partner_type: String,
    /// Side of the relationship the owning type sits on.
    pub direction: Direction,
    /// Cardinality at the owning type's end.
    pub source_multiplicity: Multiplicity,
    /// Cardinality at the partner's end.
    pub target_multiplicity: Multiplicity,
    /// Foreign-key columns on the dependent.
    #[serde(default)]
    pub from_keys: Vec<String>,
    /// Referenced key columns on the principal.
    #[serde(default)]
    pub to_keys: Vec<String>,
}

impl NavigationRelation {
    /// Creates a dependent-side relation pointing at a principal.
    pub fn from(
        property: impl Into<String>,
        partner_type: impl Into<String>,
        source: Multiplicity,
        target: Multiplicity,
    ) -> Self {
        Self {
            property: property.into(),
            partner_type: partner_type.into(),
            direction: Direction::From,
            source_multiplicity: source,
            target_multiplicity: target,
            from_keys: Vec::new(),
            to_keys: Vec::new(),
        }
    }

    /// Creates a principal-side relation pointing at dependents.
    pub fn to(
        property: impl Into<String>,
        partner_type: impl Into<String>,
        source: Multiplicity,
        target: Multiplicity,
    ) -> Self {
        Self {
            direction: Direction::To,
            ..Self::from(property, partner_type, source, target)
        }
    }

    /// Sets the key column lists.
    #[must_use]
    pub fn keys<F, T>(mut self, from_keys: F, to_keys: T) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        self.from_keys = from_keys.into_iter().map(Into::into).collect();
        self.to_keys = to_keys.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the property holds a single instance.
    pub const fn is_to_one(&self) -> bool {
        self.target_multiplicity.is_to_one()
    }

    /// Returns true if `other`, owned by `other_owner`, is the opposite end
    /// of this relation owned by `owner`.
    ///
    /// Partner names must point at each other, multiplicities must be
    /// swapped and both key lists must match.
    pub fn is_reciprocal_of(
        &self,
        owner: &str,
        other: &NavigationRelation,
        other_owner: &str,
    ) -> bool {
        if owner == other_owner && self.property == other.property {
            return false;
        }
        self.partner_type == other_owner
            && other.partner_type == owner
            && self.source_multiplicity == other.target_multiplicity
            && self.target_multiplicity == other.source_multiplicity
            && self.from_keys == other.from_keys
            && self.to_keys == other.to_keys
    }
}

/// Navigation metadata of one declared type, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationDetail {
    /// The owning type.
    pub type_name: String,
    /// Relations in declaration order.
    pub relations: Vec<NavigationRelation>,
}

impl NavigationDetail {
    /// Creates navigation metadata for a type.
    pub fn new(type_name: impl Into<String>, relations: Vec<NavigationRelation>) -> Self {
        Self {
            type_name: type_name.into(),
            relations,
        }
    }

    /// Returns relations pointing at principals.
    pub fn from_relations(&self) -> impl Iterator<Item = &NavigationRelation> {
        self.relations
            .iter()
            .filter(|r| r.direction == Direction::From)
    }

    /// Returns relations pointing at dependents.
    pub fn to_relations(&self) -> impl Iterator<Item = &NavigationRelation> {
        self.relations.iter().filter(|r| r.direction == Direction::To)
    }

    /// Looks up a relation by property name.
    pub fn get(&self, property: &str) -> Option<&NavigationRelation> {
        self.relations.iter().find(|r| r.property == property)
    }
}

/// A foreign key between two declared types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// Referenced type.
    pub principal_type: String,
    /// Referenced columns.
    pub principal_keys: Vec<String>,
    /// Referencing type.
    pub dependent_type: String,
    /// Referencing columns.
    pub dependent_keys: Vec<String>,
}
