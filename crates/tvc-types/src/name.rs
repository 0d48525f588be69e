//! Table names.
//!
//! A table is keyed by an optional schema and a name. Two names are equal
//! only if both parts match, so `public.users` and `users` are different
//! tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Characters that may never appear in a table or schema name.
const FORBIDDEN_CHARS: &[char] = &['\0', '\n', '\r', '`'];

/// Composite key of a table inside a root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// Schema the table lives in; `None` for the default schema.
    pub schema: Option<String>,
    /// The unqualified table name.
    pub name: String,
}

impl TableName {
    /// A table in the default schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// A schema-qualified table.
    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Check that both parts are non-empty and free of forbidden characters.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.is_empty() {
            return Err(self.invalid("table name must not be empty"));
        }
        if let Some(schema) = &self.schema {
            if schema.is_empty() {
                return Err(self.invalid("schema must not be empty when present"));
            }
        }
        let parts = std::iter::once(self.name.as_str()).chain(self.schema.as_deref());
        for part in parts {
            if let Some(ch) = part.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
                return Err(self.invalid(&format!("contains forbidden character: {ch:?}")));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> TypeError {
        TypeError::InvalidTableName {
            name: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Parses `name` or `schema.name`, splitting on the first dot.
impl FromStr for TableName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s.split_once('.') {
            Some((schema, name)) => Self::with_schema(schema, name),
            None => Self::new(s),
        };
        name.validate()?;
        Ok(name)
    }
}

/// Render a list of names as `a, s.b, c` for error messages.
pub fn summarize(names: &[TableName]) -> String {
    names
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equality_needs_both_parts() {
        assert_eq!(TableName::new("users"), TableName::new("users"));
        assert_ne!(
            TableName::new("users"),
            TableName::with_schema("public", "users")
        );
        assert_ne!(
            TableName::with_schema("a", "users"),
            TableName::with_schema("b", "users")
        );
    }

    #[test]
    fn display_qualifies_schema() {
        assert_eq!(TableName::new("t").to_string(), "t");
        assert_eq!(TableName::with_schema("s", "t").to_string(), "s.t");
    }

    #[test]
    fn parse_splits_on_first_dot() {
        let name: TableName = "s.t.u".parse().unwrap();
        assert_eq!(name.schema.as_deref(), Some("s"));
        assert_eq!(name.name, "t.u");
    }

    #[test]
    fn reject_empty_parts() {
        assert!("".parse::<TableName>().is_err());
        assert!(".t".parse::<TableName>().is_err());
        assert!("s.".parse::<TableName>().is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        assert!(TableName::new("bad`name").validate().is_err());
        assert!(TableName::with_schema("s\n", "t").validate().is_err());
    }

    #[test]
    fn summarize_joins_names() {
        let names = vec![TableName::new("a"), TableName::with_schema("s", "b")];
        assert_eq!(summarize(&names), "a, s.b");
    }

    proptest! {
        #[test]
        fn display_parses_back(
            schema in proptest::option::of("[a-z_]{1,8}"),
            name in "[a-z_][a-z0-9_]{0,12}"
        ) {
            let original = TableName { schema, name };
            let parsed: TableName = original.to_string().parse().unwrap();
            prop_assert_eq!(parsed, original);
        }
    }
}
