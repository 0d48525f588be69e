//! Ignore patterns for bulk staging.
//!
//! A pattern either ignores matching tables or explicitly keeps them. In a
//! pattern `*` and `%` match any run of characters and `?` matches exactly
//! one; everything else is literal and the whole name must match.
//!
//! When a table matches patterns of both kinds, the more specific side wins.
//! A pattern is less specific than another when it matches the other
//! pattern's text: `*` matches `users_*`, so `users_*` takes precedence.
//! If neither side can be discarded the table is ambiguous.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tvc_root::{Column, ColumnType, RootValue, Roots, Schema, Table};
use tvc_tuple::{Tuple, Value};
use tvc_types::TableName;

use crate::error::{StageError, StageResult};

/// Name of the table holding user-defined ignore patterns.
pub const IGNORE_TABLE: &str = "tvc_ignore";

/// One ignore rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnorePattern {
    pub pattern: String,
    /// `true` ignores matching tables, `false` keeps them.
    pub ignore: bool,
}

impl IgnorePattern {
    /// A rule that ignores matching tables.
    pub fn ignore(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ignore: true,
        }
    }

    /// A rule that keeps matching tables.
    pub fn keep(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ignore: false,
        }
    }
}

/// A table matched ignore and don't-ignore patterns of equal specificity.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "table {table} is matched by ignore patterns [{}] and don't-ignore patterns [{}]",
    .ignore_patterns.join(", "),
    .dont_ignore_patterns.join(", ")
)]
pub struct IgnoreConflict {
    pub table: TableName,
    pub ignore_patterns: Vec<String>,
    pub dont_ignore_patterns: Vec<String>,
}

/// Outcome of matching one table name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreDecision {
    /// No pattern matched.
    NotFound,
    Ignore,
    DontIgnore,
    Conflict(IgnoreConflict),
}

/// Partition of a name list by ignore rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilteredTables {
    /// Names to proceed with, in input order.
    pub keep: Vec<TableName>,
    pub ignored: Vec<TableName>,
    pub conflicts: Vec<IgnoreConflict>,
}

struct CompiledPattern {
    source: IgnorePattern,
    regex: Regex,
}

impl CompiledPattern {
    fn compile(source: IgnorePattern) -> StageResult<Self> {
        let body = regex::escape(&source.pattern)
            .replace(r"\*", ".*")
            .replace('%', ".*")
            .replace(r"\?", ".");
        let regex = Regex::new(&format!("^{body}$")).map_err(|e| {
            StageError::InvalidIgnorePattern {
                pattern: source.pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { source, regex })
    }
}

/// A compiled set of ignore rules.
pub struct IgnorePatterns {
    patterns: Vec<CompiledPattern>,
}

impl IgnorePatterns {
    /// Compile `patterns`, failing on the first invalid one.
    pub fn new(patterns: impl IntoIterator<Item = IgnorePattern>) -> StageResult<Self> {
        let patterns = patterns
            .into_iter()
            .map(CompiledPattern::compile)
            .collect::<StageResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Read the rules stored in `root`'s ignore table; none when the table
    /// is absent.
    pub fn read_table(root: &RootValue) -> StageResult<Vec<IgnorePattern>> {
        let Some(table) = root.get_table(&TableName::new(IGNORE_TABLE)) else {
            return Ok(Vec::new());
        };
        table
            .rows()
            .map(|(key, value)| decode_rule(key, value))
            .collect()
    }

    /// Build an ignore table holding `rules`.
    pub fn to_table(rules: &[IgnorePattern]) -> StageResult<Table> {
        let mut table = Table::new(ignore_table_schema()?);
        for rule in rules {
            table = table.put_values(
                IGNORE_TABLE,
                &[Value::from(rule.pattern.as_str()), Value::Bool(rule.ignore)],
            )?;
        }
        Ok(table)
    }

    /// Match `name` against every rule.
    pub fn decide(&self, name: &TableName) -> IgnoreDecision {
        let (ignores, keeps): (Vec<&CompiledPattern>, Vec<&CompiledPattern>) = self
            .patterns
            .iter()
            .filter(|p| p.regex.is_match(&name.name))
            .partition(|p| p.source.ignore);

        match (ignores.is_empty(), keeps.is_empty()) {
            (true, true) => return IgnoreDecision::NotFound,
            (true, false) => return IgnoreDecision::DontIgnore,
            (false, true) => return IgnoreDecision::Ignore,
            (false, false) => {}
        }

        let ignores_left = most_specific(&ignores, &keeps);
        let keeps_left = most_specific(&keeps, &ignores);
        if ignores_left.is_empty() {
            IgnoreDecision::DontIgnore
        } else if keeps_left.is_empty() {
            IgnoreDecision::Ignore
        } else {
            IgnoreDecision::Conflict(IgnoreConflict {
                table: name.clone(),
                ignore_patterns: ignores_left,
                dont_ignore_patterns: keeps_left,
            })
        }
    }

    /// Partition `names` into kept, ignored and ambiguous.
    pub fn filter(&self, names: &[TableName]) -> FilteredTables {
        let mut out = FilteredTables::default();
        for name in names {
            match self.decide(name) {
                IgnoreDecision::NotFound | IgnoreDecision::DontIgnore => {
                    out.keep.push(name.clone())
                }
                IgnoreDecision::Ignore => out.ignored.push(name.clone()),
                IgnoreDecision::Conflict(c) => out.conflicts.push(c),
            }
        }
        out
    }
}

impl fmt::Debug for IgnorePatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.patterns.iter().map(|p| &p.source))
            .finish()
    }
}

/// Patterns of `side` not matching any pattern text on the `other` side.
fn most_specific(side: &[&CompiledPattern], other: &[&CompiledPattern]) -> Vec<String> {
    side.iter()
        .filter(|p| !other.iter().any(|o| p.regex.is_match(&o.source.pattern)))
        .map(|p| p.source.pattern.clone())
        .collect()
}

/// Schema of the ignore table: `pattern` (key) and `ignored`.
pub fn ignore_table_schema() -> StageResult<Schema> {
    Ok(Schema::new(vec![
        Column::key("pattern", ColumnType::String),
        Column::new("ignored", ColumnType::Bool),
    ])?)
}

fn decode_rule(key: &Tuple, value: &Tuple) -> StageResult<IgnorePattern> {
    let bad = |reason: String| StageError::InvalidIgnoreTable(reason);
    let key = key.values().map_err(|e| bad(e.to_string()))?;
    let value = value.values().map_err(|e| bad(e.to_string()))?;
    match (key.as_slice(), value.as_slice()) {
        ([Value::String(pattern)], [Value::Bool(ignore)]) => Ok(IgnorePattern {
            pattern: pattern.clone(),
            ignore: *ignore,
        }),
        _ => Err(bad(format!(
            "expected (pattern string, ignored bool), found {} key and {} value fields",
            key.len(),
            value.len()
        ))),
    }
}

/// Decides which tables bulk staging should skip.
pub trait IgnoreFilter: Send + Sync {
    fn filter_tables(&self, roots: &Roots, names: &[TableName]) -> StageResult<FilteredTables>;
}

/// Reads rules from the Working root's ignore table, followed by a fixed
/// list of extra rules.
#[derive(Clone, Debug, Default)]
pub struct PatternIgnoreFilter {
    extra: Vec<IgnorePattern>,
}

impl PatternIgnoreFilter {
    /// A filter using only the ignore table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter adding `extra` rules after the ignore table.
    pub fn with_patterns(extra: Vec<IgnorePattern>) -> Self {
        Self { extra }
    }

    /// Every rule in effect for `roots`.
    pub fn rules(&self, roots: &Roots) -> StageResult<Vec<IgnorePattern>> {
        let mut rules = IgnorePatterns::read_table(&roots.working)?;
        rules.extend(self.extra.iter().cloned());
        Ok(rules)
    }
}

impl IgnoreFilter for PatternIgnoreFilter {
    fn filter_tables(&self, roots: &Roots, names: &[TableName]) -> StageResult<FilteredTables> {
        let patterns = IgnorePatterns::new(self.rules(roots)?)?;
        let filtered = patterns.filter(names);
        debug!(
            patterns = patterns.len(),
            kept = filtered.keep.len(),
            ignored = filtered.ignored.len(),
            conflicts = filtered.conflicts.len(),
            "filtered tables by ignore patterns"
        );
        Ok(filtered)
    }
}

/// Filter that ignores nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIgnore;

impl IgnoreFilter for NoIgnore {
    fn filter_tables(&self, _roots: &Roots, names: &[TableName]) -> StageResult<FilteredTables> {
        Ok(FilteredTables {
            keep: names.to_vec(),
            ..FilteredTables::default()
        })
    }
}
