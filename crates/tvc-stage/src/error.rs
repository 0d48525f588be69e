//! Error types for the staging crate.

use tvc_diff::DiffError;
use tvc_root::RootError;
use tvc_types::name::summarize;
use tvc_types::TableName;

use crate::ignore::IgnoreConflict;

/// Errors that can occur during staging operations.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// One or more requested tables exist in none of the consulted roots.
    #[error("table(s) not found: {}", summarize(.names))]
    TableNotFound { names: Vec<TableName> },

    /// A table matched both ignore and don't-ignore patterns.
    #[error(transparent)]
    IgnoreConflict(#[from] IgnoreConflict),

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern {pattern:?}: {reason}")]
    InvalidIgnorePattern { pattern: String, reason: String },

    /// The ignore table holds a row of the wrong shape.
    #[error("malformed ignore table: {0}")]
    InvalidIgnoreTable(String),

    /// Root operation failed.
    #[error("root error: {0}")]
    Root(#[from] RootError),

    /// Delta computation failed.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),
}

/// Convenience alias for staging results.
pub type StageResult<T> = Result<T, StageError>;
