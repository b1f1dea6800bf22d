//! Session configuration.

/// Configuration for a reconciliation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Whether to merge duplicate instances before committing a state.
    pub merge_duplicates: bool,

    /// Whether a duplicate search that finds nothing retries on the
    /// instance's uppermost principal parent.
    pub search_principal_parents: bool,

    /// Whether a persisted match produces field-level dirty flags.
    pub compare_persisted_values: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            merge_duplicates: true,
            search_principal_parents: true,
            compare_persisted_values: true,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether duplicates are merged.
    #[must_use]
    pub const fn merge_duplicates(mut self, value: bool) -> Self {
        self.merge_duplicates = value;
        self
    }

    /// Sets whether duplicate search climbs to principal parents.
    #[must_use]
    pub const fn search_principal_parents(mut self, value: bool) -> Self {
        self.search_principal_parents = value;
        self
    }

    /// Sets whether persisted matches are compared field by field.
    #[must_use]
    pub const fn compare_persisted_values(mut self, value: bool) -> Self {
        self.compare_persisted_values = value;
        self
    }
}
