//! # EntiGraph Core
//!
//! Graph reconciliation engine for EntiGraph.
//!
//! Given an in-memory graph of typed records built by calling code, a
//! change tracker and the persisted snapshot it knows about, this crate
//! decides for every record whether it is inserted, updated or left
//! alone, and in which order, so that foreign keys are never violated.
//!
//! This crate provides:
//! - An arena of entity instances addressed by stable handles
//! - Schema metadata and a per-session relationship catalog
//! - Identity resolution by primary key or unique properties
//! - Parent, ancestor and dependant traversals
//! - Duplicate detection and merging
//! - Type-level and tree-level ordering
//! - The state assignor and a manual adjustments facade
//!
//! ## Usage
//!
//! ```
//! use entigraph_core::{
//!     EntityGraph, EntityRecord, EntityState, InMemoryTracker, PersistedRow, Schema, Session,
//!     Tracker, TypeSchema,
//! };
//!
//! let schema = Schema::new().with_type(
//!     TypeSchema::new("Category").primary_key(["Id"]).properties(["Name"]),
//! );
//! let mut graph = EntityGraph::new();
//! let category = graph.insert(EntityRecord::new("Category").with("Id", 5).with("Name", "B"));
//!
//! let mut tracker = InMemoryTracker::new();
//! tracker.add_persisted("Category", PersistedRow::new().with("Id", 5).with("Name", "A"));
//!
//! let mut session = Session::new(&schema, &mut graph, &mut tracker);
//! let adjustments = session.define_state(category, true).unwrap();
//! assert_eq!(adjustments.summary().updates, 1);
//! drop(adjustments);
//!
//! assert_eq!(session.tracker().state(category), EntityState::Unchanged);
//! assert!(session.tracker().is_modified(category, "Name"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adjust;
mod assign;
mod catalog;
mod config;
mod detach;
mod duplicates;
mod error;
mod graph;
mod identity;
mod ordering;
mod schema;
mod session;
mod tracker;
mod traversal;
mod value;

pub use adjust::{Adjustments, EntryMut, PersistAction, PlannedAction, PropertyEntry, Summary};
pub use catalog::RelationshipCatalog;
pub use config::SessionConfig;
pub use error::{CoreError, CoreResult};
pub use graph::{EntityGraph, EntityHandle, EntityRecord, Navigation};
pub use identity::{IdentityFilter, IdentityKind};
pub use ordering::rank_types;
pub use schema::{
    Direction, ForeignKeyConstraint, MetadataProvider, Multiplicity, NavigationDetail,
    NavigationRelation, Schema, TypeSchema,
};
pub use session::Session;
pub use tracker::{EntityState, InMemoryTracker, PersistedRow, Tracker, TrackingEntry};
pub use value::Value;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
