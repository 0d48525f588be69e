//! Working copy status.
//!
//! Summarizes how Staged differs from Head and how Working differs from
//! Staged, in the shape `tvc status` prints.

use serde::{Deserialize, Serialize};
use tvc_diff::{DeltaKind, TableDelta};
use tvc_root::Roots;
use tvc_types::{Collation, TableName};

use crate::error::StageResult;
use crate::stage::Stager;

/// Complete status of a working copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootsStatus {
    /// Changes between Head and Staged.
    pub staged: Vec<StatusEntry>,
    /// Changes to known tables between Staged and Working.
    pub unstaged: Vec<StatusEntry>,
    /// Tables new in Working and not ignored.
    pub untracked: Vec<TableName>,
    /// Tables new in Working that match an ignore rule.
    pub ignored: Vec<TableName>,
    /// Working tables carrying a conflict marker.
    pub conflicts: Vec<TableName>,
    /// `(staged, working)` when the collations differ.
    pub collation_drift: Option<(Collation, Collation)>,
}

impl RootsStatus {
    /// Create an empty status.
    pub fn new() -> Self {
        Self::default()
    }

    /// No staged, unstaged or untracked changes. Ignored tables don't count.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
            && self.conflicts.is_empty()
            && self.collation_drift.is_none()
    }

    /// Returns `true` if there are any staged changes.
    pub fn has_staged_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Returns `true` if any working table carries conflicts.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Total number of entries across all categories.
    pub fn total_entries(&self) -> usize {
        self.staged.len() + self.unstaged.len() + self.untracked.len() + self.conflicts.len()
    }
}

/// One changed table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub name: TableName,
    pub status: TableStatus,
}

impl StatusEntry {
    /// Create a new status entry.
    pub fn new(name: TableName, status: TableStatus) -> Self {
        Self { name, status }
    }

    fn from_delta(delta: &TableDelta) -> Option<Self> {
        let name = delta.display_name()?.clone();
        let status = match delta.kind() {
            DeltaKind::Added => TableStatus::New,
            DeltaKind::Dropped => TableStatus::Deleted,
            DeltaKind::Modified => TableStatus::Modified,
            DeltaKind::Renamed => TableStatus::Renamed {
                from: delta.from_name()?.clone(),
            },
        };
        Some(Self { name, status })
    }
}

/// The kind of table change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    New,
    Modified,
    Deleted,
    Renamed { from: TableName },
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new table"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
            Self::Renamed { from } => write!(f, "renamed from {from}"),
        }
    }
}

impl Stager {
    /// Compute the status of `roots`. Untracked tables are split by the
    /// ignore rules; ambiguous matches are reported as untracked.
    pub fn status(&self, roots: &Roots) -> StageResult<RootsStatus> {
        let (staged, unstaged) = self.delta_source().staged_unstaged_deltas(roots)?;

        let mut status = RootsStatus::new();
        status.staged = staged.iter().filter_map(StatusEntry::from_delta).collect();

        let mut added = Vec::new();
        for delta in &unstaged {
            if delta.is_add() {
                added.extend(delta.to_name().cloned());
            } else if let Some(entry) = StatusEntry::from_delta(delta) {
                status.unstaged.push(entry);
            }
        }

        let filtered = self.ignore_filter().filter_tables(roots, &added)?;
        status.untracked = filtered.keep;
        status
            .untracked
            .extend(filtered.conflicts.into_iter().map(|c| c.table));
        status.untracked.sort();
        status.ignored = filtered.ignored;

        status.conflicts = roots
            .working
            .tables()
            .filter(|(_, table)| table.has_conflicts())
            .map(|(name, _)| name.clone())
            .collect();

        let (s, w) = (roots.staged.collation(), roots.working.collation());
        if s != w {
            status.collation_drift = Some((s, w));
        }
        Ok(status)
    }
}
