//! Runtime values and on-demand conversion between kinds.

use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

use super::geometry::GeometryValue;
use crate::numeric::{self, Number};

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

/// A literal or attribute value.
///
/// `List` is a multi-valued attribute. Filters treat it existentially
/// (see [`crate::MatchAction`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInt(BigInt),
    Decimal(BigDecimal),
    Text(String),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    Geometry(GeometryValue),
    List(Vec<Value>),
}

/// The discriminant of a [`Value`], used to request conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    BigInt,
    Decimal,
    Text,
    Date,
    Time,
    Timestamp,
    Geometry,
    List,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "Null",
            ValueKind::Bool => "Bool",
            ValueKind::Byte => "Byte",
            ValueKind::Short => "Short",
            ValueKind::Int => "Int",
            ValueKind::Long => "Long",
            ValueKind::Float => "Float",
            ValueKind::Double => "Double",
            ValueKind::BigInt => "BigInt",
            ValueKind::Decimal => "Decimal",
            ValueKind::Text => "Text",
            ValueKind::Date => "Date",
            ValueKind::Time => "Time",
            ValueKind::Timestamp => "Timestamp",
            ValueKind::Geometry => "Geometry",
            ValueKind::List => "List",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueKind::Byte
                | ValueKind::Short
                | ValueKind::Int
                | ValueKind::Long
                | ValueKind::Float
                | ValueKind::Double
                | ValueKind::BigInt
                | ValueKind::Decimal
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ValueKind::Date | ValueKind::Time | ValueKind::Timestamp)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Byte(_) => ValueKind::Byte,
            Value::Short(_) => ValueKind::Short,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::BigInt(_) => ValueKind::BigInt,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Geometry(_) => ValueKind::Geometry,
            Value::List(_) => ValueKind::List,
        }
    }

    /// Returns a human-readable type name for log messages.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Geometry view of this value; text is parsed as WKT.
    pub fn to_geometry(&self) -> Option<GeometryValue> {
        match self {
            Value::Geometry(g) => Some(g.clone()),
            Value::Text(s) => GeometryValue::from_wkt(s),
            _ => None,
        }
    }

    /// Boolean view of this value; text must spell `true` or `false`.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Text(s) => parse_bool(s),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        Number::from_value(self).and_then(|n| n.to_f64())
    }

    pub fn to_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => parse_date(s),
            _ => None,
        }
    }

    pub fn to_time(&self) -> Option<Time> {
        match self {
            Value::Time(t) => Some(*t),
            Value::Timestamp(ts) => Some(ts.time()),
            Value::Text(s) => parse_time(s),
            _ => None,
        }
    }

    pub fn to_timestamp(&self) -> Option<PrimitiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => Some(d.midnight()),
            Value::Text(s) => parse_timestamp(s).or_else(|| parse_date(s).map(|d| d.midnight())),
            _ => None,
        }
    }

    /// Convert to the requested kind, or `None` when the conversion would
    /// fail or lose information. Null converts to Null for every kind.
    pub fn convert_to(&self, kind: ValueKind) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        if self.kind() == kind {
            return Some(self.clone());
        }
        match kind {
            ValueKind::Null => None,
            ValueKind::Text => match self {
                Value::List(_) => None,
                other => Some(Value::Text(other.to_string())),
            },
            ValueKind::Bool => self.to_bool().map(Value::Bool),
            ValueKind::Byte
            | ValueKind::Short
            | ValueKind::Int
            | ValueKind::Long
            | ValueKind::Float
            | ValueKind::Double
            | ValueKind::BigInt
            | ValueKind::Decimal => Number::from_value(self).and_then(|n| numeric::narrow(&n, kind)),
            ValueKind::Date => self.to_date().map(Value::Date),
            ValueKind::Time => self.to_time().map(Value::Time),
            ValueKind::Timestamp => self.to_timestamp().map(Value::Timestamp),
            ValueKind::Geometry => self.to_geometry().map(Value::Geometry),
            ValueKind::List => Some(Value::List(vec![self.clone()])),
        }
    }

    /// Convert a JSON document value. Integers beyond `i64` become `BigInt`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Long(i)
                } else if let Some(u) = n.as_u64() {
                    Value::BigInt(BigInt::from(u))
                } else {
                    n.as_f64().map(Value::Double).unwrap_or(Value::Null)
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            // Nested objects are reached through property paths, not as values.
            serde_json::Value::Object(_) => Value::Text(json.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write_date(f, d),
            Value::Time(t) => write_time(f, t),
            Value::Timestamp(ts) => {
                write_date(f, &ts.date())?;
                f.write_str("T")?;
                write_time(f, &ts.time())
            }
            Value::Geometry(g) => write!(f, "{}", g),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

fn write_date(f: &mut fmt::Formatter<'_>, d: &Date) -> fmt::Result {
    write!(f, "{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

fn write_time(f: &mut fmt::Formatter<'_>, t: &Time) -> fmt::Result {
    write!(f, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())?;
    if t.millisecond() != 0 {
        write!(f, ".{:03}", t.millisecond())?;
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Conversions into Value
// ──────────────────────────────────────────────

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    BigInt => BigInt,
    BigDecimal => Decimal,
    String => Text,
    Date => Date,
    Time => Time,
    PrimitiveDateTime => Timestamp,
    GeometryValue => Geometry,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<geo_types::Geometry<f64>> for Value {
    fn from(v: geo_types::Geometry<f64>) -> Self {
        Value::Geometry(GeometryValue::new(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ──────────────────────────────────────────────
// Text parsing helpers
// ──────────────────────────────────────────────

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// `HH:MM:SS` with optional fraction, or `HH:MM`.
pub fn parse_time(s: &str) -> Option<Time> {
    let s = s.trim();
    Time::parse(s, format_description!("[hour]:[minute]:[second]"))
        .or_else(|_| Time::parse(s, format_description!("[hour]:[minute]:[second].[subsecond]")))
        .or_else(|_| Time::parse(s, format_description!("[hour]:[minute]")))
        .ok()
}

/// `YYYY-MM-DDTHH:MM:SS[.fff]`, also with a space separator. A trailing
/// `Z` is accepted and ignored.
pub fn parse_timestamp(s: &str) -> Option<PrimitiveDateTime> {
    let s = s.trim();
    let s = s.strip_suffix('Z').unwrap_or(s);
    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
    })
    .ok()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
