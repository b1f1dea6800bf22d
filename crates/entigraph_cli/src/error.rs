//! CLI error type.

use entigraph_core::CoreError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reconciliation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The scenario file could not be parsed.
    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),

    /// The scenario file could not be read.
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),

    /// The scenario refers to an entity name it never declares.
    #[error("unknown entity name {name}")]
    UnknownName {
        /// The dangling name.
        name: String,
    },

    /// Two entities in the scenario share a name.
    #[error("entity name {name} declared twice")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// Unsupported `--format` value.
    #[error("unknown output format {0}, expected text or json")]
    Format(String),
}
