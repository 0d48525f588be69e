//! Error types for the diff crate.

use tvc_root::RootError;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Encoding a table to compute its content id failed.
    #[error("root error: {0}")]
    Root(#[from] RootError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
