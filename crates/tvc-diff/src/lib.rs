//! Diff engine for TVC roots.
//!
//! Compares two [`RootValue`](tvc_root::RootValue)s table by table and
//! reports additions, drops, renames and modifications.
//!
//! # Key Types
//!
//! - [`TableDelta`] / [`DeltaKind`] -- one changed table between two roots
//! - [`TableDeltaSource`] -- capability consumed by the staging engine
//! - [`RootDiffer`] -- the default content-id based implementation

pub mod error;
pub mod table_delta;

pub use error::{DiffError, DiffResult};
pub use table_delta::{
    staged_unstaged_table_deltas, table_deltas, DeltaKind, RootDiffer, TableDelta,
    TableDeltaSource,
};
