use tvc_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is fed to the hasher before the data, followed by a `:`
/// separator.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for opaque values referenced from tuple fields.
    pub const BLOB: Self = Self::new("tvc-blob-v1");
    /// Hasher for individual tuple payloads.
    pub const TUPLE: Self = Self::new("tvc-tuple-v1");
    /// Hasher for a table's encoded row stream.
    pub const ROWS: Self = Self::new("tvc-rows-v1");
    /// Hasher for a table's encoded conflict stream.
    pub const CONFLICTS: Self = Self::new("tvc-conflicts-v1");
    /// Hasher for a whole table (schema, rows and conflicts).
    pub const TABLE: Self = Self::new("tvc-table-v1");
    /// Hasher for root manifests.
    pub const ROOT: Self = Self::new("tvc-root-v1");

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        self.hash_parts(&[data])
    }

    /// Hash several byte slices as if they were concatenated.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Check that `data` hashes to `expected` in this domain.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain separation tag.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
