//! Persistence of roots in an [`ObjectStore`].
//!
//! A root is written as:
//! - one `Rows` object per table (tuple stream of alternating key/value tuples)
//! - one `Conflicts` object per table with a conflict marker
//! - a JSON `Root` manifest naming the collation and, per table, its schema
//!   and object ids
//!
//! Identical tables and roots deduplicate through content addressing.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tvc_store::{ObjectKind, ObjectStore, StoredObject};
use tvc_tuple::decode_tuples;
use tvc_types::{Collation, ObjectId, TableName};

use crate::error::{RootError, RootResult};
use crate::root::RootValue;
use crate::schema::Schema;
use crate::table::Table;

#[derive(Debug, Serialize, Deserialize)]
struct RootManifest {
    collation: Collation,
    tables: Vec<TableEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableEntry {
    name: TableName,
    schema: Schema,
    rows: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conflicts: Option<ObjectId>,
}

impl RootValue {
    /// Encode the root without writing it: the manifest object followed by
    /// every row and conflict object it references.
    fn encode(&self) -> RootResult<(StoredObject, Vec<StoredObject>)> {
        let mut objects = Vec::new();
        let mut entries = Vec::with_capacity(self.len());
        for (name, table) in self.tables() {
            let rows = table.encode_rows()?;
            let conflicts = table.encode_conflicts()?;
            entries.push(TableEntry {
                name: name.clone(),
                schema: table.schema().clone(),
                rows: rows.compute_id(),
                conflicts: conflicts.as_ref().map(StoredObject::compute_id),
            });
            objects.push(rows);
            objects.extend(conflicts);
        }
        let manifest = RootManifest {
            collation: self.collation(),
            tables: entries,
        };
        let json =
            serde_json::to_vec(&manifest).map_err(|e| RootError::Serialization(e.to_string()))?;
        Ok((StoredObject::new(ObjectKind::Root, json), objects))
    }

    /// Content address of this root; equal to the id [`store`](Self::store)
    /// returns.
    pub fn content_id(&self) -> RootResult<ObjectId> {
        Ok(self.encode()?.0.compute_id())
    }

    /// Write the root and everything it references. Returns the root id.
    pub fn store(&self, store: &dyn ObjectStore) -> RootResult<ObjectId> {
        let (manifest, objects) = self.encode()?;
        store.write_batch(&objects)?;
        let id = store.write(&manifest)?;
        debug!(id = %id.short_hex(), tables = self.len(), "root stored");
        Ok(id)
    }

    /// Read a root back. Loaded tuples resolve references through `store`.
    pub fn load(store: Arc<dyn ObjectStore>, id: &ObjectId) -> RootResult<RootValue> {
        let object = read_kind(store.as_ref(), id, ObjectKind::Root)?;
        let manifest: RootManifest =
            serde_json::from_slice(&object.data).map_err(|e| RootError::Malformed {
                id: *id,
                what: "root",
                reason: e.to_string(),
            })?;

        let mut tables = BTreeMap::new();
        for entry in manifest.tables {
            let rows_obj = read_kind(store.as_ref(), &entry.rows, ObjectKind::Rows)?;
            let rows = Table::decode_rows(
                &entry.rows,
                decode_tuples(rows_obj.data, Some(Arc::clone(&store)))?,
            )?;
            let conflicts = match &entry.conflicts {
                Some(cid) => {
                    let obj = read_kind(store.as_ref(), cid, ObjectKind::Conflicts)?;
                    let tuples = decode_tuples(obj.data, Some(Arc::clone(&store)))?;
                    Some(Arc::new(Table::decode_conflicts(cid, tuples)?))
                }
                None => None,
            };
            let table = Table::from_parts(Arc::new(entry.schema), Arc::new(rows), conflicts);
            tables.insert(entry.name, table);
        }
        debug!(id = %id.short_hex(), tables = tables.len(), "root loaded");
        Ok(RootValue::from_parts(tables, manifest.collation))
    }
}

fn read_kind(store: &dyn ObjectStore, id: &ObjectId, kind: ObjectKind) -> RootResult<StoredObject> {
    let object = store.read_required(id)?;
    if object.kind != kind {
        return Err(RootError::Malformed {
            id: *id,
            what: "object",
            reason: format!("expected {kind}, found {}", object.kind),
        });
    }
    Ok(object)
}
