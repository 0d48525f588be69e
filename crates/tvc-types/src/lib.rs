//! Foundation types for TVC, a version-controlled table store.
//!
//! Every other TVC crate depends on `tvc-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash)
//! - [`TableName`] -- Optional schema plus table name, the key of a root
//! - [`Collation`] -- Database-wide character set and ordering setting

pub mod collation;
pub mod error;
pub mod name;
pub mod object;

pub use collation::Collation;
pub use error::TypeError;
pub use name::TableName;
pub use object::ObjectId;
