//! Property values
//!
//! This module defines:
//! - Value: the closed set of property value types the fact store can hold
//! - ValueType: the type discriminant, with its native store type token
//!
//! ## Type Rules
//!
//! - Ten types only; anything else is rejected at write time
//! - No implicit coercions on write: `Long(1)` and `Double(1.0)` are different values
//! - Float equality follows IEEE-754: `NaN != NaN`, `-0.0 == 0.0`
//! - Ordering is defined within a type and across numeric types, nowhere else

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// A property value
///
/// Every variant maps one-to-one onto a native value type of the fact store.
/// Integers of any width are widened to `Long` on the way in.
#[derive(Debug, Clone)]
pub enum Value {
    /// UTF-8 string
    String(String),
    /// Boolean
    Boolean(bool),
    /// 64-bit signed integer
    Long(i64),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// 32-bit floating point (IEEE-754)
    Float(f32),
    /// 64-bit floating point (IEEE-754)
    Double(f64),
    /// Arbitrary precision decimal
    BigDec(Decimal),
    /// Point in time, UTC
    Instant(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
    /// URI
    Uri(Url),
}

/// Discriminant of [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    /// `:db.type/string`
    String,
    /// `:db.type/boolean`
    Boolean,
    /// `:db.type/long`
    Long,
    /// `:db.type/bigint`
    BigInt,
    /// `:db.type/float`
    Float,
    /// `:db.type/double`
    Double,
    /// `:db.type/bigdec`
    BigDec,
    /// `:db.type/instant`
    Instant,
    /// `:db.type/uuid`
    Uuid,
    /// `:db.type/uri`
    Uri,
}

impl ValueType {
    /// All supported value types, in declaration order
    pub const ALL: [ValueType; 10] = [
        ValueType::String,
        ValueType::Boolean,
        ValueType::Long,
        ValueType::BigInt,
        ValueType::Float,
        ValueType::Double,
        ValueType::BigDec,
        ValueType::Instant,
        ValueType::Uuid,
        ValueType::Uri,
    ];

    /// Short type name used inside encoded attribute idents (`"string"`, `"long"`, ...)
    pub fn suffix(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Long => "long",
            ValueType::BigInt => "bigint",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::BigDec => "bigdec",
            ValueType::Instant => "instant",
            ValueType::Uuid => "uuid",
            ValueType::Uri => "uri",
        }
    }

    /// Native store type token (`":db.type/string"`, ...)
    pub fn token(&self) -> String {
        format!(":db.type/{}", self.suffix())
    }

    /// Inverse of [`ValueType::suffix`]
    pub fn from_suffix(suffix: &str) -> Option<ValueType> {
        ValueType::ALL.iter().copied().find(|t| t.suffix() == suffix)
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Long
                | ValueType::BigInt
                | ValueType::Float
                | ValueType::Double
                | ValueType::BigDec
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::BigDec(a), Value::BigDec(b)) => a == b,
            (Value::Instant(a), Value::Instant(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Uri(a), Value::Uri(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// The type discriminant of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Long(_) => ValueType::Long,
            Value::BigInt(_) => ValueType::BigInt,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::BigDec(_) => ValueType::BigDec,
            Value::Instant(_) => ValueType::Instant,
            Value::Uuid(_) => ValueType::Uuid,
            Value::Uri(_) => ValueType::Uri,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is a Long value
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as bool if this is a Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as Uuid if this is a Uuid value
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Compare two values
    ///
    /// Values of the same type compare natively. Numeric values of different
    /// types compare by magnitude. Every other pair is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::BigDec(a), Value::BigDec(b)) => Some(a.cmp(b)),
            (Value::Instant(a), Value::Instant(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Uri(a), Value::Uri(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::Long(a), Value::BigInt(b)) => Some(BigInt::from(*a).cmp(b)),
            (Value::BigInt(a), Value::Long(b)) => Some(a.cmp(&BigInt::from(*b))),
            (Value::Long(a), Value::BigDec(b)) => Some(Decimal::from(*a).cmp(b)),
            (Value::BigDec(a), Value::Long(b)) => Some(a.cmp(&Decimal::from(*b))),
            (a, b) if a.value_type().is_numeric() && b.value_type().is_numeric() => {
                a.approximate()?.partial_cmp(&b.approximate()?)
            }
            _ => None,
        }
    }

    fn approximate(&self) -> Option<f64> {
        match self {
            Value::Long(i) => Some(*i as f64),
            Value::BigInt(i) => i.to_string().parse().ok(),
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(f) => Some(*f),
            Value::BigDec(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Convert a dynamically typed JSON value
    ///
    /// `null` means "no value" and yields `Ok(None)`. Integers that do not
    /// fit an `i64` become `BigInt`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedValueType` for arrays and objects.
    pub fn from_json(json: serde_json::Value) -> Result<Option<Value>> {
        match json {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Bool(b) => Ok(Some(Value::Boolean(b))),
            serde_json::Value::String(s) => Ok(Some(Value::String(s))),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Some(Value::Long(i)))
                } else if let Some(u) = n.as_u64() {
                    Ok(Some(Value::BigInt(BigInt::from(u))))
                } else if let Some(f) = n.as_f64() {
                    Ok(Some(Value::Double(f)))
                } else {
                    Err(Error::UnsupportedValueType(format!("number {}", n)))
                }
            }
            serde_json::Value::Array(_) => Err(Error::UnsupportedValueType("array".to_string())),
            serde_json::Value::Object(_) => Err(Error::UnsupportedValueType("object".to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Long(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}N", i),
            Value::Float(x) => write!(f, "{}f", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::BigDec(d) => write!(f, "{}M", d),
            Value::Instant(t) => write!(f, "#inst {:?}", t.to_rfc3339()),
            Value::Uuid(u) => write!(f, "#uuid {:?}", u.to_string()),
            Value::Uri(u) => write!(f, "#uri {:?}", u.as_str()),
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Long(i64::from(i))
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::BigInt(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::BigDec(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Instant(t)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Url> for Value {
    fn from(u: Url) -> Self {
        Value::Uri(u)
    }
}
