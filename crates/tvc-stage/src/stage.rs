//! Moving tables between the roots of a working copy.
//!
//! Every operation takes a [`Roots`] by reference and returns a new one. On
//! error nothing is returned, so callers never observe a partially staged
//! set of tables.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use tvc_diff::{RootDiffer, TableDeltaSource};
use tvc_root::{RootValue, Roots};
use tvc_types::TableName;

use crate::error::{StageError, StageResult};
use crate::ignore::{IgnoreFilter, PatternIgnoreFilter};

/// Staging engine with injected ignore and diff collaborators.
#[derive(Clone)]
pub struct Stager {
    ignore: Arc<dyn IgnoreFilter>,
    differ: Arc<dyn TableDeltaSource>,
}

impl Stager {
    /// Create a stager from its collaborators.
    pub fn new(ignore: Arc<dyn IgnoreFilter>, differ: Arc<dyn TableDeltaSource>) -> Self {
        Self { ignore, differ }
    }

    /// The ignore collaborator.
    pub fn ignore_filter(&self) -> &dyn IgnoreFilter {
        self.ignore.as_ref()
    }

    /// The diff collaborator.
    pub fn delta_source(&self) -> &dyn TableDeltaSource {
        self.differ.as_ref()
    }

    /// Stage `names` from Working into Staged.
    ///
    /// With `filter_ignored`, names matched by an ignore rule are dropped
    /// first and an ambiguous match fails the whole call.
    pub fn stage_tables(
        &self,
        roots: &Roots,
        names: &[TableName],
        filter_ignored: bool,
    ) -> StageResult<Roots> {
        if !filter_ignored {
            return stage_names(roots, names);
        }
        let filtered = self.ignore.filter_tables(roots, names)?;
        if let Some(conflict) = filtered.conflicts.into_iter().next() {
            return Err(conflict.into());
        }
        if !filtered.ignored.is_empty() {
            debug!(ignored = filtered.ignored.len(), "skipping ignored tables");
        }
        stage_names(roots, &filtered.keep)
    }

    /// Stage every table in Staged or Working.
    pub fn stage_all_tables(&self, roots: &Roots, filter_ignored: bool) -> StageResult<Roots> {
        let names = union_table_names(&[&roots.staged, &roots.working]);
        self.stage_tables(roots, &names, filter_ignored)
    }

    /// Copy Working's collation onto Staged when they differ.
    pub fn stage_database(&self, roots: &Roots, _filter_ignored: bool) -> StageResult<Roots> {
        let collation = roots.working.collation();
        if roots.staged.collation() == collation {
            return Ok(roots.clone());
        }
        debug!(from = %roots.staged.collation(), to = %collation, "staging collation");
        Ok(roots.with_staged(roots.staged.set_collation(collation)))
    }

    /// Stage tables that changed or were deleted in Working. Tables added in
    /// Working are left unstaged.
    pub fn stage_modified_and_deleted_tables(&self, roots: &Roots) -> StageResult<Roots> {
        let (_, unstaged) = self.differ.staged_unstaged_deltas(roots)?;
        let names: Vec<TableName> = unstaged
            .iter()
            .filter(|delta| !delta.is_add())
            .filter_map(|delta| delta.from_name().cloned())
            .collect();
        stage_names(roots, &names)
    }

    /// Reset `names` in Staged to their Head values. Names absent from Head
    /// are removed from Staged.
    pub fn unstage_tables(&self, roots: &Roots, names: &[TableName]) -> StageResult<Roots> {
        validate_tables(names, &[&roots.staged, &roots.head])?;
        let staged = move_tables_between_roots(names, &roots.head, &roots.staged)?;
        debug!(tables = names.len(), "unstaged tables");
        Ok(roots.with_staged(staged))
    }

    /// Reset Staged to Head, collation included.
    pub fn unstage_all_tables(&self, roots: &Roots) -> StageResult<Roots> {
        let names = union_table_names(&[&roots.staged, &roots.head]);
        let unstaged = self.unstage_tables(roots, &names)?;
        let staged = unstaged.staged.set_collation(roots.head.collation());
        Ok(unstaged.with_staged(staged))
    }
}

impl Default for Stager {
    fn default() -> Self {
        Self::new(Arc::new(PatternIgnoreFilter::new()), Arc::new(RootDiffer))
    }
}

impl fmt::Debug for Stager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stager").finish_non_exhaustive()
    }
}

/// Validate, clear empty conflicts in Working, then copy into Staged.
fn stage_names(roots: &Roots, names: &[TableName]) -> StageResult<Roots> {
    if names.is_empty() {
        return Ok(roots.clone());
    }
    validate_tables(names, &[&roots.staged, &roots.working])?;
    let working = clear_empty_conflicts(names, &roots.working)?;
    let staged = move_tables_between_roots(names, &working, &roots.staged)?;
    debug!(tables = names.len(), "staged tables");
    Ok(Roots::new(working, staged, roots.head.clone()))
}

/// Check that each name exists in at least one of `roots`. Fails with every
/// missing name, in input order.
pub fn validate_tables(names: &[TableName], roots: &[&RootValue]) -> StageResult<()> {
    let missing: Vec<TableName> = names
        .iter()
        .filter(|name| !roots.iter().any(|root| root.has_table(name)))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StageError::TableNotFound { names: missing })
    }
}

/// Drop the conflict marker of each named table whose conflict set is empty.
/// Tables with conflicting rows are left alone.
pub fn clear_empty_conflicts(names: &[TableName], root: &RootValue) -> StageResult<RootValue> {
    let mut root = root.clone();
    for name in names {
        let Some(table) = root.get_table(name) else {
            continue;
        };
        if table.has_conflicts() && table.num_rows_in_conflict() == 0 {
            let cleared = table.clear_conflicts();
            debug!(table = %name, "cleared empty conflicts");
            root = root.put_table(name.clone(), cleared)?;
        }
    }
    Ok(root)
}

/// Copy each named table from `src` into `dest`; names missing from `src`
/// are removed from `dest`.
pub fn move_tables_between_roots(
    names: &[TableName],
    src: &RootValue,
    dest: &RootValue,
) -> StageResult<RootValue> {
    let mut dest = dest.clone();
    for name in names {
        dest = match src.get_table(name) {
            Some(table) => {
                debug!(table = %name, "moving table");
                dest.put_table(name.clone(), table.clone())?
            }
            None => {
                debug!(table = %name, "removing table");
                dest.remove_table(name)
            }
        };
    }
    Ok(dest)
}

/// Sorted, deduplicated table names across `roots`.
pub fn union_table_names(roots: &[&RootValue]) -> Vec<TableName> {
    roots
        .iter()
        .flat_map(|root| root.tables().map(|(name, _)| name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
