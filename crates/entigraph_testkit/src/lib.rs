//! # EntiGraph Testkit
//!
//! Test utilities for EntiGraph.
//!
//! This crate provides:
//! - Fixture schemas and a scenario harness owning a graph and tracker
//! - Property-based test generators using proptest
//! - Invariant checkers for reconciled graphs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entigraph_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_shop() {
//!     let schema = shop_schema();
//!     let mut scenario = TestScenario::new();
//!     let order = scenario.add(order("A-1"));
//!     let mut session = scenario.session(&schema);
//!     session.define_state(order, true).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod invariants;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
}

pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
