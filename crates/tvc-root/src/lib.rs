//! Immutable database snapshots for TVC.
//!
//! A [`RootValue`] maps [`TableName`](tvc_types::TableName)s to [`Table`]s and
//! carries the database collation. [`Roots`] groups the Working, Staged and
//! Head roots of a working copy. All values are persistent: every change
//! produces a new value, so roots can be shared freely between threads.
//!
//! Roots persist to an [`ObjectStore`](tvc_store::ObjectStore) as tuple
//! streams plus a JSON manifest; see [`storage`].

pub mod error;
pub mod root;
pub mod roots;
pub mod schema;
pub mod storage;
pub mod table;

pub use error::{RootError, RootResult};
pub use root::RootValue;
pub use roots::{RootIds, Roots};
pub use schema::{Column, ColumnType, Schema};
pub use table::{ConflictRow, ConflictSet, Table};
