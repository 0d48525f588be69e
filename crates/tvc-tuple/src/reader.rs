use std::io::{self, Read};
use std::iter::FusedIterator;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};
use tvc_store::ObjectStore;

use crate::error::{TupleError, TupleResult};
use crate::stream::{Close, StreamState, TupleRead, LENGTH_PREFIX_SIZE};
use crate::tuple::Tuple;

/// Reads length-framed tuples from a byte source.
///
/// Every tuple handed out carries the reader's value store, so references
/// embedded in payloads can be resolved later.
pub struct TupleReader<R: Read> {
    inner: Option<R>,
    store: Option<Arc<dyn ObjectStore>>,
    state: StreamState,
    /// Bytes consumed from the source so far.
    offset: u64,
    tuples_read: u64,
    scratch: BytesMut,
}

impl<R: Read> TupleReader<R> {
    /// A reader attaching `store` to every tuple it returns.
    pub fn new(inner: R, store: Arc<dyn ObjectStore>) -> Self {
        Self::build(inner, Some(store))
    }

    /// A reader whose tuples have no value store attached.
    pub fn detached(inner: R) -> Self {
        Self::build(inner, None)
    }

    fn build(inner: R, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self {
            inner: Some(inner),
            store,
            state: StreamState::Ready,
            offset: 0,
            tuples_read: 0,
            scratch: BytesMut::new(),
        }
    }

    /// Bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Tuples returned so far.
    pub fn tuples_read(&self) -> u64 {
        self.tuples_read
    }

    fn next_frame(&mut self) -> TupleResult<Option<Bytes>> {
        let src = self.inner.as_mut().ok_or(TupleError::Closed)?;

        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        let got = fill(src, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < LENGTH_PREFIX_SIZE {
            warn!(offset = self.offset, got, "truncated tuple frame header");
            return Err(TupleError::CorruptStream {
                offset: self.offset,
                expected: LENGTH_PREFIX_SIZE,
                available: got,
            });
        }
        let len = u32::from_be_bytes(header) as usize;

        // Grows with what the source actually delivers, not with the header.
        self.scratch.clear();
        let copied = io::copy(
            &mut Read::take(&mut *src, len as u64),
            &mut (&mut self.scratch).writer(),
        )? as usize;
        if copied < len {
            warn!(
                offset = self.offset,
                expected = len,
                available = copied,
                "truncated tuple payload"
            );
            return Err(TupleError::CorruptStream {
                offset: self.offset,
                expected: len,
                available: copied,
            });
        }

        self.offset += (LENGTH_PREFIX_SIZE + len) as u64;
        Ok(Some(self.scratch.split().freeze()))
    }
}

impl<R: Read> TupleRead for TupleReader<R> {
    fn read_tuple(&mut self) -> TupleResult<Option<Tuple>> {
        if self.state.is_terminal() {
            return Err(TupleError::Terminated(self.state));
        }
        match self.next_frame() {
            Ok(Some(payload)) => {
                self.tuples_read += 1;
                Ok(Some(Tuple::from_parts(payload, self.store.clone())))
            }
            Ok(None) => {
                self.state = StreamState::Done;
                debug!(tuples = self.tuples_read, bytes = self.offset, "tuple stream finished");
                Ok(None)
            }
            Err(TupleError::Closed) => Err(TupleError::Closed),
            Err(e) => {
                self.state = StreamState::Errored;
                Err(e)
            }
        }
    }

    fn state(&self) -> StreamState {
        self.state
    }
}

impl<R: Read> Close for TupleReader<R> {
    fn close(&mut self) -> TupleResult<()> {
        self.inner.take().ok_or(TupleError::AlreadyClosed)?;
        Ok(())
    }
}

impl<R: Read> Iterator for TupleReader<R> {
    type Item = TupleResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.is_terminal() || self.inner.is_none() {
            return None;
        }
        self.read_tuple().transpose()
    }
}

impl<R: Read> FusedIterator for TupleReader<R> {}

impl<R: Read> std::fmt::Debug for TupleReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleReader")
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("tuples_read", &self.tuples_read)
            .field("closed", &self.inner.is_none())
            .finish()
    }
}

/// Read until `buf` is full or the source is exhausted.
fn fill<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Zero-copy reader over an in-memory stream.
///
/// Returned tuples are slices of the source buffer.
pub struct TupleSliceReader {
    data: Bytes,
    pos: usize,
    store: Option<Arc<dyn ObjectStore>>,
    state: StreamState,
    closed: bool,
}

impl TupleSliceReader {
    /// A reader over `data` attaching `store` to every tuple.
    pub fn new(data: Bytes, store: Arc<dyn ObjectStore>) -> Self {
        Self::build(data, Some(store))
    }

    /// A reader over `data` with no value store.
    pub fn detached(data: Bytes) -> Self {
        Self::build(data, None)
    }

    fn build(data: Bytes, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self {
            data,
            pos: 0,
            store,
            state: StreamState::Ready,
            closed: false,
        }
    }

    /// Bytes consumed from the buffer so far.
    pub fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn next_frame(&self) -> TupleResult<Option<(Bytes, usize)>> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Ok(None);
        }
        let offset = self.pos as u64;
        let Some(header) = self.data.get(self.pos..self.pos + LENGTH_PREFIX_SIZE) else {
            return Err(TupleError::CorruptStream {
                offset,
                expected: LENGTH_PREFIX_SIZE,
                available: remaining,
            });
        };
        let mut raw = [0u8; LENGTH_PREFIX_SIZE];
        raw.copy_from_slice(header);
        let len = u32::from_be_bytes(raw) as usize;

        let start = self.pos + LENGTH_PREFIX_SIZE;
        let available = self.data.len() - start;
        if available < len {
            return Err(TupleError::CorruptStream {
                offset,
                expected: len,
                available,
            });
        }
        Ok(Some((self.data.slice(start..start + len), start + len)))
    }
}

impl TupleRead for TupleSliceReader {
    fn read_tuple(&mut self) -> TupleResult<Option<Tuple>> {
        if self.closed {
            return Err(TupleError::Closed);
        }
        if self.state.is_terminal() {
            return Err(TupleError::Terminated(self.state));
        }
        match self.next_frame() {
            Ok(Some((payload, next))) => {
                self.pos = next;
                Ok(Some(Tuple::from_parts(payload, self.store.clone())))
            }
            Ok(None) => {
                self.state = StreamState::Done;
                Ok(None)
            }
            Err(e) => {
                warn!(offset = self.pos, error = %e, "corrupt in-memory tuple stream");
                self.state = StreamState::Errored;
                Err(e)
            }
        }
    }

    fn state(&self) -> StreamState {
        self.state
    }
}

impl Close for TupleSliceReader {
    fn close(&mut self) -> TupleResult<()> {
        if self.closed {
            return Err(TupleError::AlreadyClosed);
        }
        self.closed = true;
        self.data = Bytes::new();
        self.pos = 0;
        Ok(())
    }
}

impl Iterator for TupleSliceReader {
    type Item = TupleResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.is_terminal() || self.closed {
            return None;
        }
        self.read_tuple().transpose()
    }
}

impl FusedIterator for TupleSliceReader {}

impl std::fmt::Debug for TupleSliceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleSliceReader")
            .field("state", &self.state)
            .field("pos", &self.pos)
            .field("len", &self.data.len())
            .finish()
    }
}
