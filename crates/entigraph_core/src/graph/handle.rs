//! Entity handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to an instance in an [`EntityGraph`](super::EntityGraph).
///
/// Handles are the only notion of instance identity the engine uses:
/// two handles denote the same node iff they are equal. Handles are
/// allocated in creation order and never reused, so ordering by handle
/// is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    /// Creates a handle from its raw index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the arena slot of this handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

impl From<u32> for EntityHandle {
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_creation() {
        let h1 = EntityHandle::new(1);
        let h2 = EntityHandle::new(2);
        assert!(h1 < h2);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", EntityHandle::new(42)), "entity:42");
    }
}
