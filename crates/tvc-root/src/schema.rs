use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tvc_tuple::{Tuple, TupleBuilder, Value};

use crate::error::{RootError, RootResult};

/// Storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Uint,
    Float,
    Bool,
    String,
    Bytes,
}

impl ColumnType {
    /// Lowercase type name as used in column specs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Whether `value` can be stored in a column of this type.
    ///
    /// `Null` is accepted here; primary-key nullability is checked by the
    /// schema. Out-of-line references are accepted for string and byte
    /// columns.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Int, Value::Int(_))
                | (Self::Uint, Value::Uint(_))
                | (Self::Float, Value::Float(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::String, Value::String(_) | Value::Ref(_))
                | (Self::Bytes, Value::Bytes(_) | Value::Ref(_))
        )
    }

    /// Parse text input into a value of this type. The literal `NULL` is null.
    pub fn parse_value(&self, raw: &str) -> Result<Value, String> {
        if raw == "NULL" {
            return Ok(Value::Null);
        }
        let bad = |e: String| format!("cannot parse {raw:?} as {}: {e}", self.name());
        match self {
            Self::Int => raw.parse().map(Value::Int).map_err(|e| bad(e.to_string())),
            Self::Uint => raw.parse().map(Value::Uint).map_err(|e| bad(e.to_string())),
            Self::Float => raw.parse().map(Value::Float).map_err(|e| bad(e.to_string())),
            Self::Bool => raw.parse().map(Value::Bool).map_err(|e| bad(e.to_string())),
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Bytes => {
                let digits = raw.strip_prefix("0x").unwrap_or(raw);
                hex_decode(digits).map(Value::Bytes).map_err(bad)
            }
        }
    }
}

fn hex_decode(digits: &str) -> Result<Vec<u8>, String> {
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".into());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex at position {i}"))
        })
        .collect()
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = RootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "bigint" => Ok(Self::Int),
            "uint" => Ok(Self::Uint),
            "float" | "double" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            "string" | "text" | "varchar" => Ok(Self::String),
            "bytes" | "blob" => Ok(Self::Bytes),
            other => Err(RootError::InvalidSchema(format!("unknown column type: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub primary_key: bool,
}

impl Column {
    /// A non-key column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
        }
    }

    /// A primary-key column.
    pub fn key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, column_type)
        }
    }
}

/// Parses `name:type` or `name:type:pk`.
impl FromStr for Column {
    type Err = RootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default();
        let column_type = parts
            .next()
            .ok_or_else(|| RootError::InvalidSchema(format!("column {s:?} has no type")))?
            .parse()?;
        let primary_key = match parts.next() {
            None => false,
            Some(flag) if flag.eq_ignore_ascii_case("pk") => true,
            Some(flag) => {
                return Err(RootError::InvalidSchema(format!(
                    "unknown column flag {flag:?} in {s:?}"
                )))
            }
        };
        if parts.next().is_some() {
            return Err(RootError::InvalidSchema(format!("too many parts in {s:?}")));
        }
        Ok(Self {
            name: name.to_string(),
            column_type,
            primary_key,
        })
    }
}

/// Ordered column list. Primary-key columns form the row key tuple; the
/// remaining columns form the value tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Validate and build a schema.
    pub fn new(columns: Vec<Column>) -> RootResult<Self> {
        if columns.is_empty() {
            return Err(RootError::InvalidSchema("schema has no columns".into()));
        }
        let mut seen = BTreeSet::new();
        for column in &columns {
            if column.name.is_empty() {
                return Err(RootError::InvalidSchema("column name must not be empty".into()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(RootError::InvalidSchema(format!(
                    "duplicate column: {}",
                    column.name
                )));
            }
        }
        if !columns.iter().any(|c| c.primary_key) {
            return Err(RootError::InvalidSchema("schema has no primary key".into()));
        }
        Ok(Self { columns })
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns forming the row key.
    pub fn key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// Columns forming the row value.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    /// Split a full row (in column order) into key and value tuples.
    pub fn encode_row(&self, table: &str, values: &[Value]) -> RootResult<(Tuple, Tuple)> {
        let mismatch = |reason: String| RootError::RowMismatch {
            table: table.to_string(),
            reason,
        };
        if values.len() != self.columns.len() {
            return Err(mismatch(format!(
                "expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        let mut key = TupleBuilder::new();
        let mut value = TupleBuilder::new();
        for (column, v) in self.columns.iter().zip(values) {
            if !column.column_type.accepts(v) {
                return Err(mismatch(format!(
                    "column {} is {}, got {v}",
                    column.name, column.column_type
                )));
            }
            if column.primary_key {
                if v.is_null() {
                    return Err(mismatch(format!("key column {} is NULL", column.name)));
                }
                key.push(v.clone());
            } else {
                value.push(v.clone());
            }
        }
        Ok((key.build(), value.build()))
    }

    /// Reassemble a stored key/value pair into a full row in column order.
    pub fn decode_row(&self, table: &str, key: &Tuple, value: &Tuple) -> RootResult<Vec<Value>> {
        let mut keys = key.values()?.into_iter();
        let mut rest = value.values()?.into_iter();
        let row: Option<Vec<Value>> = self
            .columns
            .iter()
            .map(|c| if c.primary_key { keys.next() } else { rest.next() })
            .collect();
        match row {
            Some(row) if keys.next().is_none() && rest.next().is_none() => Ok(row),
            _ => Err(RootError::RowMismatch {
                table: table.to_string(),
                reason: "stored row has the wrong number of fields".into(),
            }),
        }
    }

    /// Canonical bytes identifying this schema, used in table content ids.
    pub fn fingerprint(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for column in &self.columns {
            out.extend_from_slice(column.name.as_bytes());
            out.push(0);
            out.extend_from_slice(column.column_type.name().as_bytes());
            out.push(u8::from(column.primary_key));
        }
        out
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.primary_key {
                    format!("{}:{}:pk", c.name, c.column_type)
                } else {
                    format!("{}:{}", c.name, c.column_type)
                }
            })
            .collect();
        write!(f, "({})", cols.join(", "))
    }
}
