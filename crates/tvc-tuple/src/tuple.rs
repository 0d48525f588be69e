use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use tvc_crypto::ContentHasher;
use tvc_store::{ObjectStore, StoredObject};
use tvc_types::ObjectId;

use crate::error::{TupleError, TupleResult};
use crate::value::{decode_values, Value};

/// Immutable binary value handle.
///
/// A tuple is a byte buffer plus an optional reference to the store that
/// resolves [`Value::Ref`] fields embedded in it. Equality, hashing and
/// ordering look only at the bytes; the attached store is ignored.
#[derive(Clone)]
pub struct Tuple {
    data: Bytes,
    store: Option<Arc<dyn ObjectStore>>,
}

impl Tuple {
    /// Wrap a payload with no value store.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            store: None,
        }
    }

    /// A tuple whose references resolve through `store`.
    pub fn with_store(data: impl Into<Bytes>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            data: data.into(),
            store: Some(store),
        }
    }

    pub(crate) fn from_parts(data: Bytes, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { data, store }
    }

    /// Encode `values` into a new tuple.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut builder = crate::value::TupleBuilder::new();
        for v in values {
            builder.push(v);
        }
        builder.build()
    }

    /// The zero-length tuple.
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// The raw payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The payload as a cheaply cloneable buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The value store used to resolve references.
    pub fn store(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.store.as_ref()
    }

    /// Same bytes, resolved through a different store.
    pub fn attach_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Content address of the payload.
    pub fn content_id(&self) -> ObjectId {
        ContentHasher::TUPLE.hash(&self.data)
    }

    /// Decode every field.
    pub fn values(&self) -> TupleResult<Vec<Value>> {
        decode_values(&self.data)
    }

    /// Decode one field by position; `None` when out of range.
    pub fn field(&self, index: usize) -> TupleResult<Option<Value>> {
        Ok(self.values()?.into_iter().nth(index))
    }

    /// Load every object referenced by a [`Value::Ref`] field, in field order.
    pub fn resolve_refs(&self) -> TupleResult<Vec<StoredObject>> {
        let ids: Vec<ObjectId> = self
            .values()?
            .iter()
            .filter_map(Value::as_ref_id)
            .copied()
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let store = self.store.as_ref().ok_or(TupleError::NoValueStore(ids[0]))?;
        ids.iter()
            .map(|id| store.read(id)?.ok_or(TupleError::MissingValue(*id)))
            .collect()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Tuple {}

impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.as_ref().cmp(other.data.as_ref())
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 16;
        let shown = &self.data[..self.data.len().min(PREVIEW)];
        let ellipsis = if self.data.len() > PREVIEW { ".." } else { "" };
        write!(f, "Tuple({}{ellipsis}; {} bytes)", hex::encode(shown), self.data.len())
    }
}

impl From<Vec<u8>> for Tuple {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Tuple {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvc_store::{InMemoryObjectStore, ObjectKind};

    fn store() -> Arc<dyn ObjectStore> {
        Arc::new(InMemoryObjectStore::new())
    }

    #[test]
    fn equality_ignores_store() {
        let a = Tuple::new(vec![1, 2, 3]);
        let b = Tuple::with_store(vec![1, 2, 3], store());
        assert_eq!(a, b);
        assert_ne!(a, Tuple::new(vec![1, 2, 4]));
    }

    #[test]
    fn ordering_is_byte_lexicographic() {
        let mut tuples = vec![
            Tuple::from(&b"b"[..]),
            Tuple::from(&b"ab"[..]),
            Tuple::from(&b"a"[..]),
            Tuple::empty(),
        ];
        tuples.sort();
        let raw: Vec<&[u8]> = tuples.iter().map(Tuple::as_bytes).collect();
        assert_eq!(raw, vec![&b""[..], &b"a"[..], &b"ab"[..], &b"b"[..]]);
    }

    #[test]
    fn from_values_decodes_back() {
        let t = Tuple::from_values([Value::Int(1), Value::from("one")]);
        assert_eq!(t.field(1).unwrap(), Some(Value::from("one")));
        assert_eq!(t.field(5).unwrap(), None);
    }

    #[test]
    fn resolve_refs_reads_from_attached_store() {
        let store = store();
        let blob = StoredObject::new(ObjectKind::Blob, b"large value".to_vec());
        let id = store.write(&blob).unwrap();

        let t = Tuple::from_values([Value::Int(1), Value::Ref(id)]).attach_store(store);
        let resolved = t.resolve_refs().unwrap();
        assert_eq!(resolved, vec![blob]);
    }

    #[test]
    fn resolve_refs_without_store_fails() {
        let id = ObjectId::from_bytes(b"x");
        let t = Tuple::from_values([Value::Ref(id)]);
        assert!(matches!(
            t.resolve_refs(),
            Err(TupleError::NoValueStore(missing)) if missing == id
        ));
    }

    #[test]
    fn resolve_refs_missing_value() {
        let id = ObjectId::from_bytes(b"absent");
        let t = Tuple::from_values([Value::Ref(id)]).attach_store(store());
        assert!(matches!(t.resolve_refs(), Err(TupleError::MissingValue(_))));
    }

    #[test]
    fn tuple_without_refs_needs_no_store() {
        let t = Tuple::from_values([Value::Int(3)]);
        assert!(t.resolve_refs().unwrap().is_empty());
    }

    #[test]
    fn debug_truncates_long_payloads() {
        let t = Tuple::new(vec![0xAB; 40]);
        let s = format!("{t:?}");
        assert!(s.contains(".."));
        assert!(s.contains("40 bytes"));
    }
}
