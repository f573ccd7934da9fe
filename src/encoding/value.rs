//! The column value model and its binary encoding.
//!
//! Changeset value tags:
//! - 0: undefined (a column the change did not touch)
//! - 1: INTEGER (always 8 bytes, big-endian i64)
//! - 2: DOUBLE (8 bytes, big-endian IEEE 754)
//! - 3: TEXT (varint length + raw bytes)
//! - 4: BLOB (varint length + raw bytes)
//! - 5: NULL (no data follows)
//!
//! "Undefined" and NULL are distinct and must stay distinct across a
//! round-trip: an UPDATE stores undefined in both slots of every column it
//! did not touch, while NULL is a real value a column can be set to.

use super::varint::{VarintError, decode_varint, encode_varint};
use crate::errors::ParseError;

mod display;

/// Tag of a [`Value`], with discriminants matching the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ValueType {
    /// The column was not touched by the change.
    Undefined = 0,
    /// 64-bit signed integer.
    Int = 1,
    /// IEEE 754 double.
    Double = 2,
    /// Text payload.
    Text = 3,
    /// Opaque binary payload.
    Blob = 4,
    /// SQL NULL.
    Null = 5,
}

/// A single column cell of a change entry.
///
/// Text and blob values own their byte buffers; cloning a value deep-copies
/// the buffer. Equality is structural (same tag, byte-exact payload), and
/// doubles compare by bit pattern, so NaN payloads compare equal to
/// themselves and `0.0 != -0.0`.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// The column was not touched by the change. Distinct from [`Value::Null`].
    #[default]
    Undefined,
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// IEEE 754 double.
    Double(f64),
    /// Text payload. Stored as raw bytes: the codec does not validate UTF-8
    /// and embedded NUL bytes are preserved.
    Text(Vec<u8>),
    /// Opaque binary payload.
    Blob(Vec<u8>),
}

impl Value {
    /// Build a text value from raw bytes.
    #[must_use]
    pub fn text(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Text(bytes.into())
    }

    /// Build a blob value from raw bytes.
    #[must_use]
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Blob(bytes.into())
    }

    /// The tag currently held by this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Undefined => ValueType::Undefined,
            Value::Null => ValueType::Null,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
        }
    }

    /// Check if the value is undefined.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer payload.
    ///
    /// Calling this on a value with any other tag is a contract violation:
    /// it panics in debug builds and returns zero in release builds. Gate
    /// on [`value_type`](Self::value_type) first.
    #[must_use]
    pub fn as_int(&self) -> i64 {
        debug_assert_eq!(self.value_type(), ValueType::Int);
        match self {
            Value::Int(v) => *v,
            _ => 0,
        }
    }

    /// Double payload.
    ///
    /// Calling this on a value with any other tag is a contract violation:
    /// it panics in debug builds and returns zero in release builds.
    #[must_use]
    pub fn as_double(&self) -> f64 {
        debug_assert_eq!(self.value_type(), ValueType::Double);
        match self {
            Value::Double(v) => *v,
            _ => 0.0,
        }
    }

    /// Text or blob payload.
    ///
    /// Calling this on a value that is neither text nor blob is a contract
    /// violation: it panics in debug builds and returns an empty slice in
    /// release builds.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        debug_assert!(
            matches!(self, Value::Text(_) | Value::Blob(_)),
            "as_bytes on a {:?} value",
            self.value_type()
        );
        match self {
            Value::Text(bytes) | Value::Blob(bytes) => bytes,
            _ => &[],
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) | (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

// From implementations for common types
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Encode a value into the changeset binary format.
pub(crate) fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Undefined => {
            out.push(ValueType::Undefined as u8);
        }
        Value::Null => {
            out.push(ValueType::Null as u8);
        }
        Value::Int(v) => {
            // INTEGER is always 8 bytes big-endian
            out.push(ValueType::Int as u8);
            out.extend(v.to_be_bytes());
        }
        Value::Double(v) => {
            // DOUBLE is 8 bytes big-endian IEEE 754, bit pattern preserved
            out.push(ValueType::Double as u8);
            out.extend(v.to_be_bytes());
        }
        Value::Text(bytes) => {
            out.push(ValueType::Text as u8);
            out.extend(encode_varint(payload_len(bytes)));
            out.extend(bytes);
        }
        Value::Blob(bytes) => {
            out.push(ValueType::Blob as u8);
            out.extend(encode_varint(payload_len(bytes)));
            out.extend(bytes);
        }
    }
}

/// Payload lengths must fit the 32-bit varint domain.
fn payload_len(bytes: &[u8]) -> u32 {
    debug_assert!(u32::try_from(bytes.len()).is_ok(), "payload too large");
    bytes.len() as u32
}

/// Decode a value from the changeset binary format.
///
/// `data` is the unread remainder of the stream and `base` the absolute
/// offset of its first byte; errors carry absolute offsets. Returns the
/// value and the number of bytes consumed.
pub(crate) fn decode_value(data: &[u8], base: usize) -> Result<(Value, usize), ParseError> {
    let end = base + data.len();

    let Some(&tag) = data.first() else {
        return Err(ParseError::UnexpectedEof(end));
    };
    let payload = &data[1..];

    match tag {
        0 => Ok((Value::Undefined, 1)),
        5 => Ok((Value::Null, 1)),
        1 => {
            // INTEGER: 8 bytes big-endian
            let bytes = fixed8(payload, end)?;
            Ok((Value::Int(i64::from_be_bytes(bytes)), 9))
        }
        2 => {
            // DOUBLE: 8 bytes big-endian IEEE 754
            let bytes = fixed8(payload, end)?;
            Ok((Value::Double(f64::from_be_bytes(bytes)), 9))
        }
        3 | 4 => {
            // TEXT/BLOB: varint length + raw bytes
            let (len, len_bytes) = decode_varint(payload).map_err(|err| match err {
                VarintError::Truncated => ParseError::UnexpectedEof(end),
                VarintError::TooLong => ParseError::OversizedVarint(base + 1),
            })?;
            let len = len as usize;
            let rest = &payload[len_bytes..];
            if rest.len() < len {
                return Err(ParseError::UnexpectedEof(end));
            }
            let bytes = rest[..len].to_vec();
            let value = if tag == 3 {
                Value::Text(bytes)
            } else {
                Value::Blob(bytes)
            };
            Ok((value, 1 + len_bytes + len))
        }
        other => Err(ParseError::UnknownValueTag(other, base)),
    }
}

/// First eight payload bytes, or an end-of-input error at `end`.
fn fixed8(payload: &[u8], end: usize) -> Result<[u8; 8], ParseError> {
    payload
        .get(..8)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .ok_or(ParseError::UnexpectedEof(end))
}
