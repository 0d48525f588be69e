//! Staging engine for TVC.
//!
//! Moves table values between the Working, Staged and Head roots of a
//! working copy ahead of a commit. Operations are pure: they take a
//! [`Roots`](tvc_root::Roots) and return a new one, or fail without side
//! effects.
//!
//! # Key Types
//!
//! - [`Stager`] -- staging operations over injected collaborators
//! - [`IgnoreFilter`] / [`PatternIgnoreFilter`] -- which tables bulk staging skips
//! - [`RootsStatus`] -- result of status computation
//! - [`TableStatus`] -- kind of change (New, Modified, Deleted, Renamed)

pub mod error;
pub mod ignore;
pub mod stage;
pub mod status;

pub use error::{StageError, StageResult};
pub use ignore::{
    FilteredTables, IgnoreConflict, IgnoreDecision, IgnoreFilter, IgnorePattern, IgnorePatterns,
    NoIgnore, PatternIgnoreFilter, IGNORE_TABLE,
};
pub use stage::{
    clear_empty_conflicts, move_tables_between_roots, union_table_names, validate_tables, Stager,
};
pub use status::{RootsStatus, StatusEntry, TableStatus};
