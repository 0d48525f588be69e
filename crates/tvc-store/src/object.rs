use bytes::Bytes;
use tvc_crypto::ContentHasher;
use tvc_types::ObjectId;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Opaque value referenced from a tuple field.
    Blob,
    /// A table's rows as a tuple stream of alternating key/value tuples.
    Rows,
    /// A table's conflicts as a tuple stream of key/conflict tuples.
    Conflicts,
    /// A root manifest: collation plus per-table entries.
    Root,
}

impl ObjectKind {
    /// Single-byte tag used by on-disk backends.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Blob => 1,
            Self::Rows => 2,
            Self::Conflicts => 3,
            Self::Root => 4,
        }
    }

    /// Decode the on-disk type byte.
    pub fn from_type_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Blob),
            2 => Some(Self::Rows),
            3 => Some(Self::Conflicts),
            4 => Some(Self::Root),
            _ => None,
        }
    }

    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Rows => &ContentHasher::ROWS,
            Self::Conflicts => &ContentHasher::CONFLICTS,
            Self::Root => &ContentHasher::ROOT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Rows => write!(f, "rows"),
            Self::Conflicts => write!(f, "conflicts"),
            Self::Root => write!(f, "root"),
        }
    }
}

/// A stored object: kind tag plus immutable data.
///
/// `data` is a [`Bytes`] so readers can slice tuple payloads out of it
/// without copying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Bytes,
}

impl StoredObject {
    /// Create an object of `kind`.
    pub fn new(kind: ObjectKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Compute the content-addressed id under the kind's hash domain.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }
}
