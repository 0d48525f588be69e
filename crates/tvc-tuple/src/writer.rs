use std::io::Write;

use tracing::debug;

use crate::error::{TupleError, TupleResult};
use crate::stream::{Close, TupleWrite, LENGTH_PREFIX_SIZE};
use crate::tuple::Tuple;

/// Writes length-framed tuples to a byte sink.
///
/// Each frame is the payload length as a big-endian `u32` followed by the
/// payload. The two writes are not atomic: if the sink fails in between, the
/// stream ends in a truncated frame that readers report as corruption.
#[derive(Debug)]
pub struct TupleWriter<W: Write> {
    inner: Option<W>,
    tuples_written: u64,
    bytes_written: u64,
}

impl<W: Write> TupleWriter<W> {
    /// Wrap a byte sink.
    pub fn new(inner: W) -> Self {
        Self {
            inner: Some(inner),
            tuples_written: 0,
            bytes_written: 0,
        }
    }

    /// Tuples fully written so far.
    pub fn tuples_written(&self) -> u64 {
        self.tuples_written
    }

    /// Bytes emitted so far, headers included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether [`close`](Close::close) has released the sink.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// The underlying sink, unless the writer has been closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Flush the sink. Fails with [`TupleError::Closed`] after close.
    pub fn flush(&mut self) -> TupleResult<()> {
        let sink = self.inner.as_mut().ok_or(TupleError::Closed)?;
        sink.flush()?;
        Ok(())
    }

    /// Flush and hand back the sink.
    pub fn into_inner(mut self) -> TupleResult<W> {
        let mut sink = self.inner.take().ok_or(TupleError::Closed)?;
        sink.flush()?;
        Ok(sink)
    }
}

impl<W: Write> TupleWrite for TupleWriter<W> {
    fn write_tuple(&mut self, tuple: &Tuple) -> TupleResult<()> {
        let sink = self.inner.as_mut().ok_or(TupleError::Closed)?;
        let len = u32::try_from(tuple.len())
            .map_err(|_| TupleError::TooLarge { size: tuple.len() })?;

        sink.write_all(&len.to_be_bytes())?;
        sink.write_all(tuple.as_bytes())?;

        self.tuples_written += 1;
        self.bytes_written += (LENGTH_PREFIX_SIZE + tuple.len()) as u64;
        Ok(())
    }
}

impl<W: Write> Close for TupleWriter<W> {
    fn close(&mut self) -> TupleResult<()> {
        let mut sink = self.inner.take().ok_or(TupleError::AlreadyClosed)?;
        sink.flush()?;
        drop(sink);
        debug!(
            tuples = self.tuples_written,
            bytes = self.bytes_written,
            "tuple writer closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::TupleReader;
    use crate::stream::{encode_tuples, StreamState, TupleRead};
    use std::io;

    /// Accepts a fixed number of bytes, then fails.
    struct FailingSink {
        budget: usize,
        written: Vec<u8>,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone"));
            }
            let n = buf.len().min(self.budget);
            self.written.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn frame_layout() {
        let mut writer = TupleWriter::new(Vec::new());
        writer.write_tuple(&Tuple::new(b"abc".to_vec())).unwrap();
        writer.write_tuple(&Tuple::empty()).unwrap();

        assert_eq!(writer.tuples_written(), 2);
        assert_eq!(writer.bytes_written(), 11);
        assert_eq!(
            writer.into_inner().unwrap(),
            vec![0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 0]
        );
    }

    #[test]
    fn length_is_big_endian() {
        let mut writer = TupleWriter::new(Vec::new());
        writer.write_tuple(&Tuple::new(vec![7u8; 0x0102])).unwrap();
        let out = writer.into_inner().unwrap();
        assert_eq!(&out[..4], &[0, 0, 1, 2]);
        assert_eq!(out.len(), 4 + 0x0102);
    }

    #[test]
    fn double_close_is_reported() {
        let mut writer = TupleWriter::new(Vec::new());
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(writer.close(), Err(TupleError::AlreadyClosed)));
    }

    #[test]
    fn write_after_close_fails() {
        let mut writer = TupleWriter::new(Vec::new());
        writer.close().unwrap();
        let err = writer.write_tuple(&Tuple::empty()).unwrap_err();
        assert!(matches!(err, TupleError::Closed));
        assert!(writer.get_ref().is_none());
    }

    #[test]
    fn sink_failure_surfaces_immediately() {
        let sink = FailingSink {
            budget: 6,
            written: Vec::new(),
        };
        let mut writer = TupleWriter::new(sink);
        let err = writer.write_tuple(&Tuple::new(b"payload".to_vec())).unwrap_err();
        assert!(matches!(err, TupleError::Io(_)));
        assert_eq!(writer.tuples_written(), 0);
        // Header plus two payload bytes reached the sink.
        assert_eq!(writer.get_ref().unwrap().written.len(), 6);
    }

    #[test]
    fn copy_from_stops_on_sink_failure() {
        let source: Vec<Tuple> = (0..3)
            .map(|i| Tuple::new(format!("tuple-{i}").into_bytes()))
            .collect();
        let encoded = encode_tuples(&source).unwrap();
        let mut reader = TupleReader::detached(encoded.as_slice());
        // one full 11-byte frame, then only the next header fits
        let sink = FailingSink {
            budget: 15,
            written: Vec::new(),
        };
        let mut writer = TupleWriter::new(sink);

        let err = writer.copy_from(&mut reader).unwrap_err();
        assert!(matches!(err, TupleError::Io(_)));
        assert_eq!(writer.tuples_written(), 1);
        assert_eq!(reader.tuples_read(), 2);

        let written = writer.get_ref().unwrap().written.clone();
        assert_eq!(written.len(), 15);
        let mut readback = TupleReader::detached(written.as_slice());
        assert_eq!(readback.read_tuple().unwrap(), Some(source[0].clone()));
        let err = readback.read_tuple().unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(readback.state(), StreamState::Errored);
    }
}
