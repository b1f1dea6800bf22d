//! Schema metadata: declared types, navigation relations and keys.

mod provider;
mod relation;

pub use provider::{MetadataProvider, Schema, TypeSchema};
pub use relation::{Direction, ForeignKeyConstraint, Multiplicity, NavigationDetail, NavigationRelation};
