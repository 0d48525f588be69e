//! Typed field encoding inside a tuple payload.
//!
//! Layout:
//! ```text
//! [varint: field count]
//! repeat {
//!   [1 byte: tag]
//!   [tag-specific payload]
//! }
//! ```
//!
//! Fixed-width numbers are big-endian. Signed integers have their sign bit
//! flipped so that byte order matches numeric order. Strings and byte
//! strings carry a varint length. References are a raw 32-byte [`ObjectId`].

use std::fmt;

use tvc_types::object::OBJECT_ID_LEN;
use tvc_types::ObjectId;

use crate::error::{TupleError, TupleResult};
use crate::tuple::Tuple;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_UINT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_REF: u8 = 7;

const SIGN_BIT: u64 = 1 << 63;

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Reference to a value held in the content-addressed store.
    Ref(ObjectId),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The string, if this is [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this is [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The referenced id, if this is [`Value::Ref`].
    pub fn as_ref_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Ref(id) => Some(id),
            _ => None,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Null => buf.push(TAG_NULL),
            Self::Bool(b) => {
                buf.push(TAG_BOOL);
                buf.push(u8::from(*b));
            }
            Self::Int(v) => {
                buf.push(TAG_INT);
                buf.extend_from_slice(&((*v as u64) ^ SIGN_BIT).to_be_bytes());
            }
            Self::Uint(v) => {
                buf.push(TAG_UINT);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Self::Float(v) => {
                buf.push(TAG_FLOAT);
                buf.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Self::String(s) => {
                buf.push(TAG_STRING);
                encode_varint(buf, s.len() as u64);
                buf.extend_from_slice(s.as_bytes());
            }
            Self::Bytes(b) => {
                buf.push(TAG_BYTES);
                encode_varint(buf, b.len() as u64);
                buf.extend_from_slice(b);
            }
            Self::Ref(id) => {
                buf.push(TAG_REF);
                buf.extend_from_slice(id.as_bytes());
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Ref(id) => write!(f, "@{}", id.short_hex()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Accumulates fields and produces an encoded [`Tuple`].
#[derive(Debug, Default)]
pub struct TupleBuilder {
    fields: Vec<u8>,
    count: u64,
}

impl TupleBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        value.into().encode_into(&mut self.fields);
        self.count += 1;
        self
    }

    /// Number of fields pushed so far.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Returns `true` if no field has been pushed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Encode the fields into a tuple.
    pub fn build(&self) -> Tuple {
        let mut buf = Vec::with_capacity(self.fields.len() + 2);
        encode_varint(&mut buf, self.count);
        buf.extend_from_slice(&self.fields);
        Tuple::new(buf)
    }
}

/// Decode every field of an encoded tuple payload.
pub fn decode_values(data: &[u8]) -> TupleResult<Vec<Value>> {
    let (count, mut pos) = decode_varint(data, 0)?;
    // Each field takes at least its tag byte.
    let mut values = Vec::with_capacity((count as usize).min(data.len()));
    for _ in 0..count {
        let (value, next) = decode_value(data, pos)?;
        values.push(value);
        pos = next;
    }
    if pos != data.len() {
        return Err(malformed(pos, format!("{} trailing bytes", data.len() - pos)));
    }
    Ok(values)
}

fn decode_value(data: &[u8], pos: usize) -> TupleResult<(Value, usize)> {
    let tag = *data
        .get(pos)
        .ok_or_else(|| malformed(pos, "missing field tag".into()))?;
    let body = pos + 1;
    match tag {
        TAG_NULL => Ok((Value::Null, body)),
        TAG_BOOL => {
            let b = take(data, body, 1)?;
            match b[0] {
                0 => Ok((Value::Bool(false), body + 1)),
                1 => Ok((Value::Bool(true), body + 1)),
                other => Err(malformed(body, format!("invalid bool byte {other}"))),
            }
        }
        TAG_INT => {
            let raw = read_u64(data, body)?;
            Ok((Value::Int((raw ^ SIGN_BIT) as i64), body + 8))
        }
        TAG_UINT => Ok((Value::Uint(read_u64(data, body)?), body + 8)),
        TAG_FLOAT => Ok((Value::Float(f64::from_bits(read_u64(data, body)?)), body + 8)),
        TAG_STRING => {
            let (len, start) = decode_varint(data, body)?;
            let raw = take(data, start, len as usize)?;
            let s = std::str::from_utf8(raw)
                .map_err(|e| malformed(start, format!("invalid utf-8: {e}")))?;
            Ok((Value::String(s.to_string()), start + raw.len()))
        }
        TAG_BYTES => {
            let (len, start) = decode_varint(data, body)?;
            let raw = take(data, start, len as usize)?;
            Ok((Value::Bytes(raw.to_vec()), start + raw.len()))
        }
        TAG_REF => {
            let raw = take(data, body, OBJECT_ID_LEN)?;
            let id = ObjectId::from_slice(raw).map_err(|e| malformed(body, e.to_string()))?;
            Ok((Value::Ref(id), body + OBJECT_ID_LEN))
        }
        other => Err(malformed(pos, format!("unknown field tag {other}"))),
    }
}

fn take(data: &[u8], pos: usize, len: usize) -> TupleResult<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| {
            malformed(
                pos,
                format!("need {len} bytes, {} remain", data.len().saturating_sub(pos)),
            )
        })
}

fn read_u64(data: &[u8], pos: usize) -> TupleResult<u64> {
    let raw = take(data, pos, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(raw);
    Ok(u64::from_be_bytes(arr))
}

fn malformed(offset: usize, reason: String) -> TupleError {
    TupleError::MalformedField { offset, reason }
}

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint starting at `pos`. Returns (value, position after it).
pub(crate) fn decode_varint(data: &[u8], pos: usize) -> TupleResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate().skip(pos) {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(malformed(pos, "varint overflow".into()));
        }
    }
    Err(malformed(pos, "truncated varint".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_encodes_all_kinds() {
        let id = ObjectId::from_bytes(b"blob");
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-42),
            Value::Uint(7),
            Value::Float(1.5),
            Value::String("héllo".into()),
            Value::Bytes(vec![0, 1, 2]),
            Value::Ref(id),
        ];
        let mut builder = TupleBuilder::new();
        for v in &values {
            builder.push(v.clone());
        }
        assert_eq!(builder.len(), 8);
        let tuple = builder.build();
        assert_eq!(decode_values(tuple.as_bytes()).unwrap(), values);
    }

    #[test]
    fn empty_builder_is_single_count_byte() {
        let tuple = TupleBuilder::new().build();
        assert_eq!(tuple.as_bytes(), &[0]);
        assert!(decode_values(tuple.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn signed_ints_sort_bytewise() {
        let enc = |v: i64| TupleBuilder::new().push(v).build();
        assert!(enc(-5) < enc(-1));
        assert!(enc(-1) < enc(0));
        assert!(enc(0) < enc(1_000));
    }

    #[test]
    fn truncated_field_is_malformed() {
        let tuple = TupleBuilder::new().push("abcdef").build();
        let cut = &tuple.as_bytes()[..tuple.len() - 2];
        assert!(matches!(
            decode_values(cut),
            Err(TupleError::MalformedField { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let err = decode_values(&[1, 0xEE]).unwrap_err();
        assert!(err.to_string().contains("unknown field tag"));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let err = decode_values(&[0, 9]).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn invalid_bool_is_malformed() {
        assert!(decode_values(&[1, TAG_BOOL, 2]).is_err());
    }

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            assert_eq!(decode_varint(&buf, 0).unwrap(), (value, buf.len()));
        }
        assert!(decode_varint(&[0x80], 0).is_err());
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::Bytes(vec![0xAB]).to_string(), "0xab");
    }
}
