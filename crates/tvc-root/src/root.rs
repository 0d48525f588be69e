use std::collections::BTreeMap;
use std::sync::Arc;

use tvc_types::{Collation, TableName};

use crate::error::{RootError, RootResult};
use crate::table::Table;

/// Immutable snapshot of every table in a database, plus its collation.
///
/// Cloning is cheap. Modifications return a new root and leave `self`
/// untouched; the table map is copied only when a shared root is modified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootValue {
    tables: Arc<BTreeMap<TableName, Table>>,
    collation: Collation,
}

impl RootValue {
    /// An empty root with the default collation.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty root with `collation`.
    pub fn with_collation(collation: Collation) -> Self {
        Self {
            tables: Arc::default(),
            collation,
        }
    }

    pub(crate) fn from_parts(tables: BTreeMap<TableName, Table>, collation: Collation) -> Self {
        Self {
            tables: Arc::new(tables),
            collation,
        }
    }

    /// Look up a table by name.
    pub fn get_table(&self, name: &TableName) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Like [`get_table`](Self::get_table), failing when absent.
    pub fn require_table(&self, name: &TableName) -> RootResult<&Table> {
        self.get_table(name)
            .ok_or_else(|| RootError::TableNotFound(name.clone()))
    }

    /// Whether `name` is present.
    pub fn has_table(&self, name: &TableName) -> bool {
        self.tables.contains_key(name)
    }

    /// Insert or replace a table.
    pub fn put_table(&self, name: TableName, table: Table) -> RootResult<RootValue> {
        name.validate()?;
        let mut next = self.clone();
        Arc::make_mut(&mut next.tables).insert(name, table);
        Ok(next)
    }

    /// Remove a table; a missing name leaves the root as is.
    pub fn remove_table(&self, name: &TableName) -> RootValue {
        if !self.has_table(name) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.tables).remove(name);
        next
    }

    /// Sorted table names.
    pub fn table_names(&self) -> Vec<TableName> {
        self.tables.keys().cloned().collect()
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = (&TableName, &Table)> {
        self.tables.iter()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if the root holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The database collation.
    pub fn collation(&self) -> Collation {
        self.collation
    }

    /// A root with the same tables and a new collation.
    pub fn set_collation(&self, collation: Collation) -> RootValue {
        Self {
            tables: Arc::clone(&self.tables),
            collation,
        }
    }

    /// Whether both roots share the same table map allocation.
    pub fn shares_tables_with(&self, other: &RootValue) -> bool {
        Arc::ptr_eq(&self.tables, &other.tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Schema};
    use tvc_tuple::Tuple;

    fn table() -> Table {
        Table::new(Schema::new(vec![Column::key("id", ColumnType::Int)]).unwrap())
    }

    #[test]
    fn put_returns_new_root() {
        let empty = RootValue::new();
        let one = empty.put_table(TableName::new("a"), table()).unwrap();
        assert!(empty.is_empty());
        assert!(one.has_table(&TableName::new("a")));
        assert!(!one.has_table(&TableName::with_schema("s", "a")));
    }

    #[test]
    fn put_rejects_invalid_names() {
        let err = RootValue::new()
            .put_table(TableName::new(""), table())
            .unwrap_err();
        assert!(matches!(err, RootError::InvalidName(_)));
    }

    #[test]
    fn remove_is_copy_on_write() {
        let root = RootValue::new()
            .put_table(TableName::new("a"), table())
            .unwrap()
            .put_table(TableName::new("b"), table())
            .unwrap();
        let removed = root.remove_table(&TableName::new("a"));
        assert_eq!(root.len(), 2);
        assert_eq!(removed.table_names(), vec![TableName::new("b")]);

        let same = root.remove_table(&TableName::new("zzz"));
        assert!(same.shares_tables_with(&root));
    }

    #[test]
    fn require_table_names_the_missing_table() {
        let err = RootValue::new().require_table(&TableName::new("x")).unwrap_err();
        assert_eq!(err.to_string(), "table not found: x");
    }

    #[test]
    fn collation_change_keeps_tables_shared() {
        let root = RootValue::new().put_table(TableName::new("a"), table()).unwrap();
        let changed = root.set_collation(Collation::Utf8AiCi);
        assert_eq!(root.collation(), Collation::Utf8Bin);
        assert_eq!(changed.collation(), Collation::Utf8AiCi);
        assert!(changed.shares_tables_with(&root));
        assert_ne!(changed, root);
    }

    #[test]
    fn table_names_are_sorted() {
        let root = ["c", "a", "b"].iter().fold(RootValue::new(), |r, n| {
            r.put_table(TableName::new(*n), table()).unwrap()
        });
        let names: Vec<String> = root.table_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn tables_compare_by_content() {
        let t = table().insert_row(
            Tuple::from_values([1i64]),
            Tuple::from_values(Vec::<i64>::new()),
        );
        let a = RootValue::new().put_table(TableName::new("a"), t.clone()).unwrap();
        let b = RootValue::new().put_table(TableName::new("a"), t).unwrap();
        assert_eq!(a, b);
    }
}
