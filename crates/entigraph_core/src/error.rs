//! Error types for EntiGraph core.

use crate::graph::EntityHandle;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during graph reconciliation.
///
/// All of these are contract violations against the reconciliation
/// entry points. None is retried, and no partial rollback is attempted:
/// a failed session may have mutated tracking state up to the failure.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required argument was missing or did not refer to a live instance.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the offending argument.
        message: String,
    },

    /// The schema has no record of a referenced type.
    #[error("no metadata for type {type_name}")]
    MetadataMissing {
        /// Name of the unknown type.
        type_name: String,
    },

    /// An ordering was requested over instances of more than one type.
    #[error("mixed types in single-type batch: expected {expected}, found {found}")]
    MixedType {
        /// Type of the first instance in the batch.
        expected: String,
        /// The first differing type encountered.
        found: String,
    },

    /// A parent walk revisited an instance already on the current path.
    #[error("cycle detected through {entity} while following {relation}")]
    CycleDetected {
        /// The instance that closed the cycle.
        entity: EntityHandle,
        /// The walk being performed.
        relation: String,
    },

    /// The tracking layer refused a reference mutation.
    #[error("referential integrity conflict on {entity}.{property}: state {state} forbids the change")]
    ReferentialIntegrityConflict {
        /// The instance whose reference was being rewritten.
        entity: EntityHandle,
        /// The navigation property.
        property: String,
        /// The tracking state that refused the mutation.
        state: String,
    },

    /// A property name is not declared on the type.
    #[error("unknown property {property} on type {type_name}")]
    UnknownProperty {
        /// The owning type.
        type_name: String,
        /// The property that was requested.
        property: String,
    },

    /// Schema document could not be parsed.
    #[error("schema parse error: {0}")]
    Schema(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a metadata missing error.
    pub fn metadata_missing(type_name: impl Into<String>) -> Self {
        Self::MetadataMissing {
            type_name: type_name.into(),
        }
    }

    /// Creates a mixed type error.
    pub fn mixed_type(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::MixedType {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a cycle detected error.
    pub fn cycle_detected(entity: EntityHandle, relation: impl Into<String>) -> Self {
        Self::CycleDetected {
            entity,
            relation: relation.into(),
        }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates an invalid input error for a handle the arena does not know.
    pub fn unknown_entity(entity: EntityHandle) -> Self {
        Self::invalid_input(format!("no live instance for {entity}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_metadata_missing() {
        let err = CoreError::metadata_missing("Invoice");
        assert_eq!(err.to_string(), "no metadata for type Invoice");
    }

    #[test]
    fn display_cycle() {
        let err = CoreError::cycle_detected(EntityHandle::new(3), "Category.Parent");
        assert_eq!(
            err.to_string(),
            "cycle detected through entity:3 while following Category.Parent"
        );
    }
}
