use thiserror::Error;
use tvc_store::StoreError;
use tvc_tuple::TupleError;
use tvc_types::{ObjectId, TableName, TypeError};

#[derive(Debug, Error)]
pub enum RootError {
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    #[error("table not found: {0}")]
    TableNotFound(TableName),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("row does not match schema of {table}: {reason}")]
    RowMismatch { table: String, reason: String },

    #[error("malformed {what} object {id}: {reason}")]
    Malformed {
        id: ObjectId,
        what: &'static str,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),
}

pub type RootResult<T> = Result<T, RootError>;
