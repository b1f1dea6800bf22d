//! Caller-owned entity instances.

mod arena;
mod handle;

pub use arena::{EntityGraph, EntityRecord, Navigation};
pub use handle::EntityHandle;
