use thiserror::Error;
use tvc_store::StoreError;
use tvc_types::ObjectId;

use crate::stream::StreamState;

#[derive(Debug, Error)]
pub enum TupleError {
    /// A frame header was committed but the stream ended before the frame
    /// was complete.
    #[error("corrupt tuple stream at offset {offset}: expected {expected} bytes, found {available}")]
    CorruptStream {
        offset: u64,
        expected: usize,
        available: usize,
    },

    #[error("tuple stream already closed")]
    AlreadyClosed,

    #[error("tuple stream is closed")]
    Closed,

    #[error("tuple stream is {0}; no further reads are valid")]
    Terminated(StreamState),

    #[error("tuple of {size} bytes exceeds the u32 frame length")]
    TooLarge { size: usize },

    #[error("copy cancelled after {copied} tuples")]
    Cancelled { copied: u64 },

    #[error("malformed tuple field at byte {offset}: {reason}")]
    MalformedField { offset: usize, reason: String },

    #[error("tuple has no value store to resolve {0}")]
    NoValueStore(ObjectId),

    #[error("referenced value not found: {0}")]
    MissingValue(ObjectId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TupleError {
    /// Whether this error means the stream bytes themselves are damaged.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptStream { .. })
    }
}

pub type TupleResult<T> = Result<T, TupleError>;
