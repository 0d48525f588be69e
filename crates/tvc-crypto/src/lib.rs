//! Content hashing for TVC.
//!
//! Every content address in the system is a BLAKE3 hash computed under a
//! domain tag, so a tuple and a root manifest with identical bytes never
//! collide. All crypto operations wrap `blake3`; nothing here is custom.

pub mod hasher;

pub use hasher::ContentHasher;
