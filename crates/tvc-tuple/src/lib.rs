//! Tuple handles and the length-framed tuple stream.
//!
//! A [`Tuple`] is an immutable byte buffer, optionally bound to the object
//! store that resolves value references embedded in it. Tuples are
//! serialized for transfer and persistence as a stream of frames:
//!
//! - **[`TupleWriter`]**: frames tuples onto any `io::Write`
//! - **[`TupleReader`]**: parses frames from any `io::Read`, with a
//!   `Ready -> Done | Errored` lifecycle
//! - **[`TupleSliceReader`]**: zero-copy parsing of an in-memory stream
//!
//! The payload itself is opaque to the stream. [`TupleBuilder`] and
//! [`Value`] provide the typed field encoding used for table rows.

pub mod error;
pub mod reader;
pub mod stream;
pub mod tuple;
pub mod value;
pub mod writer;

pub use error::{TupleError, TupleResult};
pub use reader::{TupleReader, TupleSliceReader};
pub use stream::{
    decode_tuples, encode_tuples, Close, StreamState, TupleRead, TupleWrite, LENGTH_PREFIX_SIZE,
};
pub use tuple::Tuple;
pub use value::{decode_values, TupleBuilder, Value};
pub use writer::TupleWriter;
