//! CLI command implementations.

pub mod order;
pub mod plan;
