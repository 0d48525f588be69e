//! Length-framed tuple streams.
//!
//! Wire format:
//! ```text
//! repeat {
//!   [4 bytes: payload length (big-endian u32)]
//!   [N bytes: payload]
//! }
//! ```
//!
//! A stream ends cleanly only when the source is exhausted exactly at a
//! length-field boundary. Anything else is corruption.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tvc_store::ObjectStore;

use crate::error::{TupleError, TupleResult};
use crate::reader::TupleSliceReader;
use crate::tuple::Tuple;
use crate::writer::TupleWriter;

/// Size of the frame header.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Reader lifecycle. `Done` and `Errored` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Ready,
    Done,
    Errored,
}

impl StreamState {
    /// Whether no further reads are valid.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ready)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Done => write!(f, "done"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// A forward-only source of tuples.
pub trait TupleRead {
    /// Next tuple, or `None` on a clean end of stream.
    fn read_tuple(&mut self) -> TupleResult<Option<Tuple>>;

    fn state(&self) -> StreamState;
}

/// A sink of tuples.
pub trait TupleWrite {
    fn write_tuple(&mut self, tuple: &Tuple) -> TupleResult<()>;

    fn write_tuples(&mut self, tuples: &[Tuple]) -> TupleResult<()> {
        for tuple in tuples {
            self.write_tuple(tuple)?;
        }
        Ok(())
    }

    /// Drain `reader` into this sink. Returns the number of tuples copied.
    ///
    /// Stops only on a clean end of stream; the first error from either side
    /// is returned as is.
    fn copy_from(&mut self, reader: &mut dyn TupleRead) -> TupleResult<u64> {
        let mut copied = 0;
        while let Some(tuple) = reader.read_tuple()? {
            self.write_tuple(&tuple)?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Like [`copy_from`](Self::copy_from), checking `cancel` before each tuple.
    fn copy_from_until(
        &mut self,
        reader: &mut dyn TupleRead,
        cancel: &AtomicBool,
    ) -> TupleResult<u64> {
        let mut copied = 0;
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(TupleError::Cancelled { copied });
            }
            match reader.read_tuple()? {
                Some(tuple) => {
                    self.write_tuple(&tuple)?;
                    copied += 1;
                }
                None => return Ok(copied),
            }
        }
    }
}

/// Explicit release of the underlying sink or source.
///
/// A second call fails with [`TupleError::AlreadyClosed`].
pub trait Close {
    fn close(&mut self) -> TupleResult<()>;
}

/// Frame `tuples` into a single buffer.
pub fn encode_tuples(tuples: &[Tuple]) -> TupleResult<Vec<u8>> {
    let capacity = tuples
        .iter()
        .map(|t| LENGTH_PREFIX_SIZE + t.len())
        .sum();
    let mut writer = TupleWriter::new(Vec::with_capacity(capacity));
    writer.write_tuples(tuples)?;
    writer.into_inner()
}

/// Parse every frame in `data`. Payloads share `data`'s allocation.
pub fn decode_tuples(data: Bytes, store: Option<Arc<dyn ObjectStore>>) -> TupleResult<Vec<Tuple>> {
    let reader = match store {
        Some(store) => TupleSliceReader::new(data, store),
        None => TupleSliceReader::detached(data),
    };
    reader.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::TupleReader;

    fn tuples(n: usize) -> Vec<Tuple> {
        (0..n)
            .map(|i| Tuple::new(format!("tuple-{i}").into_bytes()))
            .collect()
    }

    /// Flips a flag after handing out a fixed number of tuples.
    struct CancelAfter<'a> {
        inner: TupleSliceReader,
        remaining: usize,
        cancel: &'a AtomicBool,
    }

    impl TupleRead for CancelAfter<'_> {
        fn read_tuple(&mut self) -> TupleResult<Option<Tuple>> {
            if self.remaining == 0 {
                self.cancel.store(true, Ordering::Release);
            } else {
                self.remaining -= 1;
            }
            self.inner.read_tuple()
        }

        fn state(&self) -> StreamState {
            self.inner.state()
        }
    }

    #[test]
    fn encode_decode_preserves_order() {
        let input = tuples(5);
        let encoded = encode_tuples(&input).unwrap();
        let expected_len: usize = input.iter().map(|t| 4 + t.len()).sum();
        assert_eq!(encoded.len(), expected_len);
        assert_eq!(decode_tuples(Bytes::from(encoded), None).unwrap(), input);
    }

    #[test]
    fn empty_stream_decodes_to_nothing() {
        assert!(encode_tuples(&[]).unwrap().is_empty());
        assert!(decode_tuples(Bytes::new(), None).unwrap().is_empty());
    }

    #[test]
    fn copy_from_drains_source() {
        let input = tuples(3);
        let encoded = encode_tuples(&input).unwrap();
        let mut reader = TupleReader::detached(encoded.as_slice());
        let mut writer = TupleWriter::new(Vec::new());

        assert_eq!(writer.copy_from(&mut reader).unwrap(), 3);
        assert_eq!(reader.state(), StreamState::Done);
        assert_eq!(writer.into_inner().unwrap(), encoded);
    }

    #[test]
    fn copy_from_propagates_corruption() {
        let mut encoded = encode_tuples(&tuples(2)).unwrap();
        encoded.truncate(encoded.len() - 1);
        let mut reader = TupleReader::detached(encoded.as_slice());
        let mut writer = TupleWriter::new(Vec::new());

        let err = writer.copy_from(&mut reader).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(reader.state(), StreamState::Errored);
        assert_eq!(writer.tuples_written(), 1);
    }

    #[test]
    fn copy_until_honours_preset_cancel() {
        let encoded = encode_tuples(&tuples(3)).unwrap();
        let mut reader = TupleReader::detached(encoded.as_slice());
        let mut writer = TupleWriter::new(Vec::new());
        let cancel = AtomicBool::new(true);

        let err = writer.copy_from_until(&mut reader, &cancel).unwrap_err();
        assert!(matches!(err, TupleError::Cancelled { copied: 0 }));
        assert_eq!(reader.state(), StreamState::Ready);
    }

    #[test]
    fn copy_until_stops_between_tuples() {
        let encoded = encode_tuples(&tuples(5)).unwrap();
        let cancel = AtomicBool::new(false);
        let mut reader = CancelAfter {
            inner: TupleSliceReader::detached(Bytes::from(encoded)),
            remaining: 2,
            cancel: &cancel,
        };
        let mut writer = TupleWriter::new(Vec::new());

        let err = writer.copy_from_until(&mut reader, &cancel).unwrap_err();
        assert!(matches!(err, TupleError::Cancelled { copied: 3 }));
        assert_eq!(writer.tuples_written(), 3);
    }

    #[test]
    fn copy_until_completes_without_cancel() {
        let encoded = encode_tuples(&tuples(4)).unwrap();
        let mut reader = TupleSliceReader::detached(Bytes::from(encoded));
        let mut writer = TupleWriter::new(Vec::new());
        let cancel = AtomicBool::new(false);
        assert_eq!(writer.copy_from_until(&mut reader, &cancel).unwrap(), 4);
    }

    #[test]
    fn terminal_states() {
        assert!(!StreamState::Ready.is_terminal());
        assert!(StreamState::Done.is_terminal());
        assert!(StreamState::Errored.is_terminal());
        assert_eq!(StreamState::Errored.to_string(), "errored");
    }
}
