//! Table-level diff: compare two roots and list the tables that changed.
//!
//! Tables are paired by name. Tables present on only one side are paired as
//! renames when their content ids are identical; the rest are adds or drops.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;
use tvc_root::{RootValue, Roots, Table};
use tvc_types::{ObjectId, TableName};

use crate::error::DiffResult;

/// How a table changed between two roots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Added,
    Dropped,
    Renamed,
    Modified,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "new table"),
            Self::Dropped => write!(f, "deleted"),
            Self::Renamed => write!(f, "renamed"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// One changed table. The `from` side is absent for additions and the `to`
/// side is absent for drops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDelta {
    pub from_name: Option<TableName>,
    pub to_name: Option<TableName>,
    pub from_table: Option<Table>,
    pub to_table: Option<Table>,
}

impl TableDelta {
    fn added(name: &TableName, table: &Table) -> Self {
        Self {
            from_name: None,
            to_name: Some(name.clone()),
            from_table: None,
            to_table: Some(table.clone()),
        }
    }

    fn dropped(name: &TableName, table: &Table) -> Self {
        Self {
            from_name: Some(name.clone()),
            to_name: None,
            from_table: Some(table.clone()),
            to_table: None,
        }
    }

    fn paired(from: (&TableName, &Table), to: (&TableName, &Table)) -> Self {
        Self {
            from_name: Some(from.0.clone()),
            to_name: Some(to.0.clone()),
            from_table: Some(from.1.clone()),
            to_table: Some(to.1.clone()),
        }
    }

    /// Name on the old side, absent for additions.
    pub fn from_name(&self) -> Option<&TableName> {
        self.from_name.as_ref()
    }

    /// Name on the new side, absent for drops.
    pub fn to_name(&self) -> Option<&TableName> {
        self.to_name.as_ref()
    }

    /// The name to show for this delta: the new name, else the old one.
    pub fn display_name(&self) -> Option<&TableName> {
        self.to_name.as_ref().or(self.from_name.as_ref())
    }

    /// Table exists only on the new side.
    pub fn is_add(&self) -> bool {
        self.from_name.is_none() && self.to_name.is_some()
    }

    /// Table exists only on the old side.
    pub fn is_drop(&self) -> bool {
        self.from_name.is_some() && self.to_name.is_none()
    }

    /// Same content under a different name.
    pub fn is_rename(&self) -> bool {
        matches!((&self.from_name, &self.to_name), (Some(a), Some(b)) if a != b)
    }

    /// Same name on both sides with different content.
    pub fn is_modified(&self) -> bool {
        matches!((&self.from_name, &self.to_name), (Some(a), Some(b)) if a == b)
    }

    /// Classify the delta.
    pub fn kind(&self) -> DeltaKind {
        if self.is_add() {
            DeltaKind::Added
        } else if self.is_drop() {
            DeltaKind::Dropped
        } else if self.is_rename() {
            DeltaKind::Renamed
        } else {
            DeltaKind::Modified
        }
    }

    /// Whether the new side carries a conflict marker.
    pub fn has_conflicts(&self) -> bool {
        self.to_table.as_ref().is_some_and(Table::has_conflicts)
    }
}

impl fmt::Display for TableDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.from_name, &self.to_name) {
            (Some(from), Some(to)) if from != to => write!(f, "{}: {from} -> {to}", self.kind()),
            (_, Some(name)) | (Some(name), None) => write!(f, "{}: {name}", self.kind()),
            (None, None) => write!(f, "{}", self.kind()),
        }
    }
}

/// Every table that differs between `from` and `to`, ordered by name.
pub fn table_deltas(from: &RootValue, to: &RootValue) -> DiffResult<Vec<TableDelta>> {
    let mut deltas = Vec::new();
    let mut dropped: Vec<(&TableName, &Table, ObjectId)> = Vec::new();
    let mut added: Vec<(&TableName, &Table, ObjectId)> = Vec::new();

    for (name, old) in from.tables() {
        match to.get_table(name) {
            Some(new) => {
                if old.content_id()? != new.content_id()? {
                    deltas.push(TableDelta::paired((name, old), (name, new)));
                }
            }
            None => dropped.push((name, old, old.content_id()?)),
        }
    }
    for (name, new) in to.tables() {
        if !from.has_table(name) {
            added.push((name, new, new.content_id()?));
        }
    }

    let mut matched_adds = HashSet::new();
    for (old_name, old, old_id) in dropped {
        let rename = added
            .iter()
            .enumerate()
            .find(|(ai, (_, _, new_id))| *new_id == old_id && !matched_adds.contains(ai));
        match rename {
            Some((ai, (new_name, new, _))) => {
                deltas.push(TableDelta::paired((old_name, old), (*new_name, *new)));
                matched_adds.insert(ai);
            }
            None => deltas.push(TableDelta::dropped(old_name, old)),
        }
    }
    for (ai, (name, new, _)) in added.iter().enumerate() {
        if !matched_adds.contains(&ai) {
            deltas.push(TableDelta::added(name, new));
        }
    }

    deltas.sort_by(|a, b| a.display_name().cmp(&b.display_name()));
    debug!(changed = deltas.len(), "computed table deltas");
    Ok(deltas)
}

/// `(staged, unstaged)`: Head to Staged, and Staged to Working.
pub fn staged_unstaged_table_deltas(
    roots: &Roots,
) -> DiffResult<(Vec<TableDelta>, Vec<TableDelta>)> {
    let staged = table_deltas(&roots.head, &roots.staged)?;
    let unstaged = table_deltas(&roots.staged, &roots.working)?;
    Ok((staged, unstaged))
}

/// Supplies staged and unstaged table deltas for a set of roots.
pub trait TableDeltaSource: Send + Sync {
    fn staged_unstaged_deltas(&self, roots: &Roots)
        -> DiffResult<(Vec<TableDelta>, Vec<TableDelta>)>;
}

/// Default [`TableDeltaSource`] comparing tables by content id.
#[derive(Clone, Copy, Debug, Default)]
pub struct RootDiffer;

impl TableDeltaSource for RootDiffer {
    fn staged_unstaged_deltas(
        &self,
        roots: &Roots,
    ) -> DiffResult<(Vec<TableDelta>, Vec<TableDelta>)> {
        staged_unstaged_table_deltas(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvc_root::{Column, ColumnType, ConflictSet, Schema};
    use tvc_tuple::Value;

    fn table(rows: &[i64]) -> Table {
        let schema = Schema::new(vec![Column::key("id", ColumnType::Int)]).unwrap();
        rows.iter().fold(Table::new(schema), |t, id| {
            t.put_values("t", &[Value::Int(*id)]).unwrap()
        })
    }

    fn root(tables: &[(&str, Table)]) -> RootValue {
        tables.iter().fold(RootValue::new(), |r, (name, t)| {
            r.put_table(TableName::new(*name), t.clone()).unwrap()
        })
    }

    #[test]
    fn identical_roots_have_no_deltas() {
        let r = root(&[("a", table(&[1])), ("b", table(&[2]))]);
        assert!(table_deltas(&r, &r.clone()).unwrap().is_empty());
    }

    #[test]
    fn detects_add_drop_modify() {
        let from = root(&[("a", table(&[1])), ("b", table(&[2]))]);
        let to = root(&[("a", table(&[1, 5])), ("c", table(&[3]))]);
        let deltas = table_deltas(&from, &to).unwrap();

        let kinds: Vec<(String, DeltaKind)> = deltas
            .iter()
            .map(|d| (d.display_name().unwrap().to_string(), d.kind()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a".to_string(), DeltaKind::Modified),
                ("b".to_string(), DeltaKind::Dropped),
                ("c".to_string(), DeltaKind::Added),
            ]
        );
        assert!(deltas[0].is_modified());
        assert!(deltas[1].is_drop());
        assert_eq!(deltas[1].from_name(), Some(&TableName::new("b")));
        assert!(deltas[2].is_add());
        assert!(deltas[2].from_name().is_none());
    }

    #[test]
    fn identical_content_is_a_rename() {
        let from = root(&[("old", table(&[1, 2]))]);
        let to = root(&[("new", table(&[1, 2]))]);
        let deltas = table_deltas(&from, &to).unwrap();
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].is_rename());
        assert!(!deltas[0].is_add());
        assert_eq!(deltas[0].from_name(), Some(&TableName::new("old")));
        assert_eq!(deltas[0].to_string(), "renamed: old -> new");
    }

    #[test]
    fn one_drop_pairs_with_one_add() {
        let from = root(&[("x", table(&[1]))]);
        let to = root(&[("y", table(&[1])), ("z", table(&[1]))]);
        let deltas = table_deltas(&from, &to).unwrap();
        let renames = deltas.iter().filter(|d| d.is_rename()).count();
        let adds = deltas.iter().filter(|d| d.is_add()).count();
        assert_eq!((renames, adds), (1, 1));
    }

    #[test]
    fn conflict_marker_counts_as_modification() {
        let t = table(&[1]);
        let from = root(&[("a", t.clone())]);
        let to = root(&[("a", t.with_conflicts(ConflictSet::new()))]);
        let deltas = table_deltas(&from, &to).unwrap();
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].has_conflicts());
    }

    #[test]
    fn staged_and_unstaged_use_the_right_roots() {
        let head = root(&[("a", table(&[1]))]);
        let staged = root(&[("a", table(&[1, 2]))]);
        let working = root(&[("a", table(&[1, 2])), ("b", table(&[]))]);
        let roots = Roots::new(working, staged, head);

        let (staged, unstaged) = RootDiffer.staged_unstaged_deltas(&roots).unwrap();
        assert_eq!(staged.len(), 1);
        assert!(staged[0].is_modified());
        assert_eq!(unstaged.len(), 1);
        assert!(unstaged[0].is_add());
    }
}
