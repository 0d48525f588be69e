use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tvc_crypto::ContentHasher;
use tvc_store::{ObjectKind, StoredObject};
use tvc_tuple::{encode_tuples, Tuple, TupleBuilder, Value};
use tvc_types::ObjectId;

use crate::error::{RootError, RootResult};
use crate::schema::Schema;

/// One unresolved row: the three sides of a merge that disagreed.
///
/// A side is `None` when the row did not exist there.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictRow {
    pub base: Option<Tuple>,
    pub ours: Option<Tuple>,
    pub theirs: Option<Tuple>,
}

impl ConflictRow {
    pub(crate) fn to_tuple(&self) -> Tuple {
        let side = |t: &Option<Tuple>| match t {
            Some(t) => Value::Bytes(t.as_bytes().to_vec()),
            None => Value::Null,
        };
        let mut builder = TupleBuilder::new();
        builder
            .push(side(&self.base))
            .push(side(&self.ours))
            .push(side(&self.theirs));
        builder.build()
    }

    pub(crate) fn from_tuple(tuple: &Tuple) -> Result<Self, String> {
        let side = |v: Value| match v {
            Value::Null => Ok(None),
            Value::Bytes(b) => {
                let t = Tuple::new(b);
                Ok(Some(match tuple.store() {
                    Some(store) => t.attach_store(Arc::clone(store)),
                    None => t,
                }))
            }
            other => Err(format!("unexpected conflict side {other}")),
        };
        let values = tuple.values().map_err(|e| e.to_string())?;
        let [base, ours, theirs]: [Value; 3] = values
            .try_into()
            .map_err(|v: Vec<Value>| format!("conflict row has {} fields, expected 3", v.len()))?;
        Ok(Self {
            base: side(base)?,
            ours: side(ours)?,
            theirs: side(theirs)?,
        })
    }
}

/// Conflicting rows of a table, keyed by row key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictSet {
    rows: BTreeMap<Tuple, ConflictRow>,
}

impl ConflictSet {
    /// An empty conflict set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conflicting row, replacing any previous entry for `key`.
    pub fn insert(&mut self, key: Tuple, row: ConflictRow) -> Option<ConflictRow> {
        self.rows.insert(key, row)
    }

    /// Resolve the conflict on `key`.
    pub fn remove(&mut self, key: &Tuple) -> Option<ConflictRow> {
        self.rows.remove(key)
    }

    /// The conflict recorded for `key`.
    pub fn get(&self, key: &Tuple) -> Option<&ConflictRow> {
        self.rows.get(key)
    }

    /// Number of rows in conflict.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no row is in conflict.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Conflicts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Tuple, &ConflictRow)> {
        self.rows.iter()
    }
}

impl FromIterator<(Tuple, ConflictRow)> for ConflictSet {
    fn from_iter<I: IntoIterator<Item = (Tuple, ConflictRow)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Immutable table value: schema, rows keyed by primary key, and an
/// optional conflict set.
///
/// Every mutating method returns a new table. Row and conflict maps are
/// shared between versions until one of them is modified.
#[derive(Clone)]
pub struct Table {
    schema: Arc<Schema>,
    rows: Arc<BTreeMap<Tuple, Tuple>>,
    conflicts: Option<Arc<ConflictSet>>,
    content_id: OnceLock<ObjectId>,
}

impl Table {
    /// An empty table.
    pub fn new(schema: Schema) -> Self {
        Self::from_parts(Arc::new(schema), Arc::default(), None)
    }

    /// A table holding `rows`, without conflicts.
    pub fn with_rows(schema: Schema, rows: BTreeMap<Tuple, Tuple>) -> Self {
        Self::from_parts(Arc::new(schema), Arc::new(rows), None)
    }

    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        rows: Arc<BTreeMap<Tuple, Tuple>>,
        conflicts: Option<Arc<ConflictSet>>,
    ) -> Self {
        Self {
            schema,
            rows,
            conflicts,
            content_id: OnceLock::new(),
        }
    }

    /// The table schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The value tuple stored under `key`.
    pub fn get_row(&self, key: &Tuple) -> Option<&Tuple> {
        self.rows.get(key)
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&Tuple, &Tuple)> {
        self.rows.iter()
    }

    /// A copy with `key` set to `value`.
    pub fn insert_row(&self, key: Tuple, value: Tuple) -> Table {
        let mut rows = Arc::clone(&self.rows);
        Arc::make_mut(&mut rows).insert(key, value);
        Self::from_parts(Arc::clone(&self.schema), rows, self.conflicts.clone())
    }

    /// Encode `values` with the schema and insert the row.
    pub fn put_values(&self, table: &str, values: &[Value]) -> RootResult<Table> {
        let (key, value) = self.schema.encode_row(table, values)?;
        Ok(self.insert_row(key, value))
    }

    /// Returns the table unchanged when `key` is absent.
    pub fn delete_row(&self, key: &Tuple) -> Table {
        if !self.rows.contains_key(key) {
            return self.clone();
        }
        let mut rows = Arc::clone(&self.rows);
        Arc::make_mut(&mut rows).remove(key);
        Self::from_parts(Arc::clone(&self.schema), rows, self.conflicts.clone())
    }

    /// Whether the table carries a conflict marker, even an empty one.
    pub fn has_conflicts(&self) -> bool {
        self.conflicts.is_some()
    }

    /// Rows in the conflict set; zero without a marker.
    pub fn num_rows_in_conflict(&self) -> usize {
        self.conflicts.as_ref().map_or(0, |c| c.len())
    }

    /// The conflict set, if the table carries a marker.
    pub fn conflicts(&self) -> Option<&ConflictSet> {
        self.conflicts.as_deref()
    }

    /// A copy carrying `conflicts` as its marker.
    pub fn with_conflicts(&self, conflicts: ConflictSet) -> Table {
        Self::from_parts(
            Arc::clone(&self.schema),
            Arc::clone(&self.rows),
            Some(Arc::new(conflicts)),
        )
    }

    /// Drop the conflict marker entirely.
    pub fn clear_conflicts(&self) -> Table {
        Self::from_parts(Arc::clone(&self.schema), Arc::clone(&self.rows), None)
    }

    /// Rows as a stream of alternating key and value tuples.
    pub fn encode_rows(&self) -> RootResult<StoredObject> {
        let tuples: Vec<Tuple> = self
            .rows
            .iter()
            .flat_map(|(k, v)| [k.clone(), v.clone()])
            .collect();
        Ok(StoredObject::new(ObjectKind::Rows, encode_tuples(&tuples)?))
    }

    /// Conflicts as a stream of alternating key and conflict tuples.
    pub fn encode_conflicts(&self) -> RootResult<Option<StoredObject>> {
        let Some(conflicts) = &self.conflicts else {
            return Ok(None);
        };
        let tuples: Vec<Tuple> = conflicts
            .iter()
            .flat_map(|(k, row)| [k.clone(), row.to_tuple()])
            .collect();
        Ok(Some(StoredObject::new(
            ObjectKind::Conflicts,
            encode_tuples(&tuples)?,
        )))
    }

    /// Content address over schema, rows and conflicts. Two tables with the
    /// same id are interchangeable.
    pub fn content_id(&self) -> RootResult<ObjectId> {
        if let Some(id) = self.content_id.get() {
            return Ok(*id);
        }
        let rows_id = self.encode_rows()?.compute_id();
        let conflicts_id = self.encode_conflicts()?.map(|c| c.compute_id());
        let fingerprint = self.schema.fingerprint();
        let id = ContentHasher::TABLE.hash_parts(&[
            fingerprint.as_slice(),
            &rows_id.as_bytes()[..],
            conflicts_id.as_ref().map_or(&[][..], |id| &id.as_bytes()[..]),
        ]);
        let _ = self.content_id.set(id);
        Ok(id)
    }

    pub(crate) fn decode_rows(
        id: &ObjectId,
        tuples: Vec<Tuple>,
    ) -> RootResult<BTreeMap<Tuple, Tuple>> {
        if tuples.len() % 2 != 0 {
            return Err(RootError::Malformed {
                id: *id,
                what: "rows",
                reason: format!("odd tuple count {}", tuples.len()),
            });
        }
        let mut rows = BTreeMap::new();
        let mut it = tuples.into_iter();
        while let (Some(k), Some(v)) = (it.next(), it.next()) {
            rows.insert(k, v);
        }
        Ok(rows)
    }

    pub(crate) fn decode_conflicts(id: &ObjectId, tuples: Vec<Tuple>) -> RootResult<ConflictSet> {
        let malformed = |reason: String| RootError::Malformed {
            id: *id,
            what: "conflicts",
            reason,
        };
        if tuples.len() % 2 != 0 {
            return Err(malformed(format!("odd tuple count {}", tuples.len())));
        }
        let mut set = ConflictSet::new();
        let mut it = tuples.into_iter();
        while let (Some(k), Some(c)) = (it.next(), it.next()) {
            set.insert(k, ConflictRow::from_tuple(&c).map_err(malformed)?);
        }
        Ok(set)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.rows, &other.rows) || self.rows == other.rows)
            && self.schema == other.schema
            && self.conflicts == other.conflicts
    }
}

impl Eq for Table {}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.schema.to_string())
            .field("rows", &self.rows.len())
            .field("conflicts", &self.conflicts.as_ref().map(|c| c.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::key("id", ColumnType::Int),
            Column::new("v", ColumnType::String),
        ])
        .unwrap()
    }

    fn row(id: i64, v: &str) -> (Tuple, Tuple) {
        (Tuple::from_values([id]), Tuple::from_values([v]))
    }

    #[test]
    fn insert_leaves_original_untouched() {
        let empty = Table::new(schema());
        let (k, v) = row(1, "one");
        let one = empty.insert_row(k.clone(), v.clone());

        assert_eq!(empty.row_count(), 0);
        assert_eq!(one.row_count(), 1);
        assert_eq!(one.get_row(&k), Some(&v));
    }

    #[test]
    fn delete_missing_is_noop() {
        let (k, v) = row(1, "one");
        let t = Table::new(schema()).insert_row(k.clone(), v);
        let (other, _) = row(2, "two");
        assert_eq!(t.delete_row(&other), t);
        assert_eq!(t.delete_row(&k).row_count(), 0);
    }

    #[test]
    fn content_id_tracks_rows() {
        let (k, v) = row(1, "one");
        let a = Table::new(schema()).insert_row(k.clone(), v.clone());
        let b = Table::new(schema()).insert_row(k.clone(), v);
        assert_eq!(a.content_id().unwrap(), b.content_id().unwrap());

        let c = a.insert_row(k, Tuple::from_values(["uno"]));
        assert_ne!(a.content_id().unwrap(), c.content_id().unwrap());
    }

    #[test]
    fn content_id_tracks_conflict_marker() {
        let t = Table::new(schema());
        let marked = t.with_conflicts(ConflictSet::new());
        assert!(marked.has_conflicts());
        assert_eq!(marked.num_rows_in_conflict(), 0);
        assert_ne!(t.content_id().unwrap(), marked.content_id().unwrap());
        assert_eq!(
            t.content_id().unwrap(),
            marked.clear_conflicts().content_id().unwrap()
        );
    }

    #[test]
    fn conflict_row_tuple_roundtrip() {
        let row = ConflictRow {
            base: None,
            ours: Some(Tuple::from_values(["mine"])),
            theirs: Some(Tuple::from_values(["yours"])),
        };
        assert_eq!(ConflictRow::from_tuple(&row.to_tuple()).unwrap(), row);
        assert!(ConflictRow::from_tuple(&Tuple::from_values([1i64])).is_err());
    }

    #[test]
    fn rows_encode_as_alternating_stream() {
        let (k, v) = row(1, "one");
        let t = Table::new(schema()).insert_row(k.clone(), v.clone());
        let obj = t.encode_rows().unwrap();
        assert_eq!(obj.kind, ObjectKind::Rows);
        let tuples = tvc_tuple::decode_tuples(obj.data, None).unwrap();
        assert_eq!(tuples, vec![k, v]);
    }

    #[test]
    fn odd_row_stream_is_malformed() {
        let id = ObjectId::from_bytes(b"rows");
        let err = Table::decode_rows(&id, vec![Tuple::empty()]).unwrap_err();
        assert!(matches!(err, RootError::Malformed { what: "rows", .. }));
    }

    #[test]
    fn put_values_validates_against_schema() {
        let t = Table::new(schema());
        let t = t
            .put_values("t", &[Value::Int(3), Value::from("three")])
            .unwrap();
        assert_eq!(t.row_count(), 1);
        assert!(t.put_values("t", &[Value::from("x")]).is_err());
    }
}
