//! Runtime property values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A property value captured from an entity.
///
/// Every scalar variant has a single, locale-independent text form produced
/// by [`Value::to_audit_string`]; audit details compare and store values in
/// that form only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
    /// Owned sub-object, as ordered (property, value) pairs.
    Complex(Vec<(String, Value)>),
    /// A value the audit layer cannot render, tagged with its type name.
    Opaque(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an owned sub-object.
    pub fn is_complex(&self) -> bool {
        matches!(self, Value::Complex(_))
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Complex(_) => "complex",
            Value::Opaque(type_name) => type_name.as_str(),
        }
    }

    /// Render the value in its invariant text form.
    ///
    /// `Null` renders as `None`; an empty string stays `Some("")`.
    /// Booleans render as `True` / `False`, timestamps as RFC 3339 UTC,
    /// bytes as lowercase hex and UUIDs in hyphenated form. Complex and
    /// opaque values have no text form and fail with
    /// [`Error::UnsupportedValue`].
    pub fn to_audit_string(&self, property: &str) -> Result<Option<String>, Error> {
        let text = match self {
            Value::Null => return Ok(None),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int32(i) => i.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Float32(f) => f.to_string(),
            Value::Float64(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => hex::encode(b),
            Value::Timestamp(micros) => DateTime::<Utc>::from_timestamp_micros(*micros)
                .ok_or_else(|| Error::UnsupportedValue {
                    property: property.to_string(),
                    type_name: format!("timestamp out of range ({micros})"),
                })?
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Uuid(u) => format_uuid(u),
            Value::Complex(_) | Value::Opaque(_) => {
                return Err(Error::UnsupportedValue {
                    property: property.to_string(),
                    type_name: self.type_name().to_string(),
                })
            }
        };
        Ok(Some(text))
    }

    /// Leaf entries of an owned sub-object, or an empty list for scalars.
    pub fn leaves(&self) -> &[(String, Value)] {
        match self {
            Value::Complex(fields) => fields,
            _ => &[],
        }
    }
}

fn format_uuid(bytes: &[u8; 16]) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        hex::encode(&bytes[0..4]),
        hex::encode(&bytes[4..6]),
        hex::encode(&bytes[6..8]),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..16])
    )
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.timestamp_micros())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: Value) -> Option<String> {
        value.to_audit_string("p").unwrap()
    }

    #[test]
    fn test_scalar_text_forms() {
        assert_eq!(text(Value::Bool(true)).as_deref(), Some("True"));
        assert_eq!(text(Value::Bool(false)).as_deref(), Some("False"));
        assert_eq!(text(Value::Int32(-42)).as_deref(), Some("-42"));
        assert_eq!(text(Value::Int64(9_000_000_000)).as_deref(), Some("9000000000"));
        assert_eq!(text(Value::Float64(1.5)).as_deref(), Some("1.5"));
        assert_eq!(text(Value::Bytes(vec![0xde, 0xad])).as_deref(), Some("dead"));
    }

    #[test]
    fn test_null_and_empty_are_distinct() {
        assert_eq!(text(Value::Null), None);
        assert_eq!(text(Value::String(String::new())), Some(String::new()));
    }

    #[test]
    fn test_timestamp_is_utc_rfc3339() {
        // 2024-01-02T03:04:05Z
        let micros = 1_704_164_645_000_000;
        assert_eq!(
            text(Value::Timestamp(micros)).as_deref(),
            Some("2024-01-02T03:04:05Z")
        );
    }

    #[test]
    fn test_uuid_is_hyphenated() {
        let mut bytes = [0u8; 16];
        bytes[15] = 1;
        assert_eq!(
            text(Value::Uuid(bytes)).as_deref(),
            Some("00000000-0000-0000-0000-000000000001")
        );
    }

    #[test]
    fn test_unsupported_values_fail() {
        let err = Value::Opaque("Geometry".into())
            .to_audit_string("Shape")
            .unwrap_err();
        assert!(err.to_string().contains("Shape"));
        assert!(err.to_string().contains("Geometry"));

        assert!(Value::Complex(vec![]).to_audit_string("Address").is_err());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }
}
