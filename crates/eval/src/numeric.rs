//! Cross-kind comparison and arithmetic.
//!
//! Numeric kinds are normalised into a [`Number`] before comparing so a
//! 16-bit value, its text form, its floating form and its arbitrary
//! precision form all compare equal. Integers that `f64` cannot hold
//! exactly are compared against floats through the float's exact binary
//! value, so `2^60` as a double equals `2^60` as a long while
//! `i64::MAX as f64 + 10000.0` never equals `i64::MAX`. Floats meet
//! decimals through their shortest round-trip representation instead,
//! which keeps `0.1` equal to the decimal `0.1`.
//!
//! Nothing here fails: a pair that cannot be brought to a common kind is
//! "not comparable" (`None`).

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use tracing::trace;

use crate::expression::ArithmeticOp;
use crate::types::{Value, ValueKind};

/// Largest magnitude at which every integer is exactly representable as f64.
const F64_EXACT_INT: i64 = 1 << 53;

/// A numeric value normalised for comparison and arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Long(i64),
    Big(BigInt),
    Double(f64),
    Decimal(BigDecimal),
}

impl Number {
    /// Numeric view of a value; text is parsed on demand.
    pub fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Byte(v) => Some(Number::Long(i64::from(*v))),
            Value::Short(v) => Some(Number::Long(i64::from(*v))),
            Value::Int(v) => Some(Number::Long(i64::from(*v))),
            Value::Long(v) => Some(Number::Long(*v)),
            // Widen through the shortest decimal form so 0.1f32 stays 0.1.
            Value::Float(v) => v
                .to_string()
                .parse::<f64>()
                .ok()
                .map(Number::Double),
            Value::Double(v) => Some(Number::Double(*v)),
            Value::BigInt(v) => Some(Number::Big(v.clone())),
            Value::Decimal(v) => Some(Number::Decimal(v.clone())),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Number::Long(v) => Some(*v as f64),
            Number::Big(v) => v.to_f64(),
            Number::Double(v) => Some(*v),
            Number::Decimal(v) => v.to_f64(),
        }
    }

    /// Exact decimal form. Non-finite floats have none.
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Number::Long(v) => Some(BigDecimal::from(*v)),
            Number::Big(v) => Some(BigDecimal::new(v.clone(), 0)),
            Number::Double(v) => f64_to_decimal(*v),
            Number::Decimal(v) => Some(v.clone()),
        }
    }

    /// Integer form, only when the value has no fractional part.
    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Number::Long(v) => Some(BigInt::from(*v)),
            Number::Big(v) => Some(v.clone()),
            Number::Double(v) => {
                let d = exact_decimal(*v)?;
                if d.is_integer() {
                    Some(d.with_scale(0).as_bigint_and_exponent().0)
                } else {
                    None
                }
            }
            Number::Decimal(d) => {
                if d.is_integer() {
                    Some(d.with_scale(0).as_bigint_and_exponent().0)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Number::Long(_) | Number::Big(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Long(v) => Value::Long(v),
            Number::Big(v) => match v.to_i64() {
                Some(small) => Value::Long(small),
                None => Value::BigInt(v),
            },
            Number::Double(v) => Value::Double(v),
            Number::Decimal(v) => Value::Decimal(v),
        }
    }
}

/// Parse text as the narrowest number that holds it exactly.
pub fn parse_number(text: &str) -> Option<Number> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(Number::Long(v));
    }
    if let Ok(v) = BigInt::from_str(s) {
        return Some(Number::Big(v));
    }
    if let Ok(v) = BigDecimal::from_str(s) {
        return Some(Number::Decimal(v));
    }
    // NaN and the infinities only exist as floats.
    s.parse::<f64>().ok().map(Number::Double)
}

fn f64_to_decimal(v: f64) -> Option<BigDecimal> {
    if !v.is_finite() {
        return None;
    }
    BigDecimal::from_str(&v.to_string()).ok()
}

/// The exact value of a finite float, `mantissa * 2^exponent`.
fn exact_decimal(v: f64) -> Option<BigDecimal> {
    if !v.is_finite() {
        return None;
    }
    let bits = v.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    let mut digits = BigInt::from(mantissa);
    if bits >> 63 == 1 {
        digits = -digits;
    }
    if exponent >= 0 {
        Some(BigDecimal::new(digits << exponent as usize, 0))
    } else {
        // m / 2^k == m * 5^k / 10^k
        let k = -exponent;
        Some(BigDecimal::new(digits * BigInt::from(5u8).pow(k as u32), k))
    }
}

fn i64_fits_f64(v: i64) -> bool {
    (-F64_EXACT_INT..=F64_EXACT_INT).contains(&v)
}

/// Order two numbers of any kind.
pub fn compare_numbers(left: &Number, right: &Number) -> Option<Ordering> {
    match (left, right) {
        (Number::Long(a), Number::Long(b)) => Some(a.cmp(b)),
        (Number::Double(a), Number::Double(b)) => a.partial_cmp(b),
        (Number::Long(a), Number::Double(b)) if i64_fits_f64(*a) => (*a as f64).partial_cmp(b),
        (Number::Double(a), Number::Long(b)) if i64_fits_f64(*b) => a.partial_cmp(&(*b as f64)),
        (Number::Long(_) | Number::Big(_), Number::Long(_) | Number::Big(_)) => {
            Some(left.to_bigint()?.cmp(&right.to_bigint()?))
        }
        (Number::Double(a), _) if !a.is_finite() => compare_non_finite(*a),
        (_, Number::Double(b)) if !b.is_finite() => compare_non_finite(*b).map(Ordering::reverse),
        (Number::Long(_) | Number::Big(_), Number::Double(b)) => {
            Some(left.to_decimal()?.cmp(&exact_decimal(*b)?))
        }
        (Number::Double(a), Number::Long(_) | Number::Big(_)) => {
            Some(exact_decimal(*a)?.cmp(&right.to_decimal()?))
        }
        _ => Some(left.to_decimal()?.cmp(&right.to_decimal()?)),
    }
}

/// Position of a non-finite float relative to any finite number.
fn compare_non_finite(v: f64) -> Option<Ordering> {
    if v.is_nan() {
        None
    } else if v > 0.0 {
        Some(Ordering::Greater)
    } else {
        Some(Ordering::Less)
    }
}

/// Convert a number to the requested numeric kind without losing
/// information. Fractions never narrow to integer kinds.
pub fn narrow(number: &Number, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::Byte => number.to_bigint()?.to_i8().map(Value::Byte),
        ValueKind::Short => number.to_bigint()?.to_i16().map(Value::Short),
        ValueKind::Int => number.to_bigint()?.to_i32().map(Value::Int),
        ValueKind::Long => number.to_bigint()?.to_i64().map(Value::Long),
        ValueKind::BigInt => number.to_bigint().map(Value::BigInt),
        ValueKind::Float => number.to_f64().map(|v| Value::Float(v as f32)),
        ValueKind::Double => number.to_f64().map(Value::Double),
        ValueKind::Decimal => number.to_decimal().map(Value::Decimal),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Value comparison
// ──────────────────────────────────────────────

/// Order two scalar values, coercing to a common kind when possible.
///
/// Null on either side, geometries, lists, and pairs with no common kind
/// are not comparable.
pub fn compare_values(left: &Value, right: &Value, match_case: bool) -> Option<Ordering> {
    let result = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return None,
        (Value::Text(l), Value::Text(r)) => Some(compare_text(l, r, match_case)),
        (Value::Bool(l), r) => r.to_bool().map(|r| l.cmp(&r)),
        (l, Value::Bool(r)) => l.to_bool().map(|l| l.cmp(r)),
        (Value::Date(_), Value::Timestamp(_) | Value::Text(_))
        | (Value::Timestamp(_), Value::Date(_) | Value::Timestamp(_) | Value::Text(_))
        | (Value::Text(_), Value::Timestamp(_)) => {
            match (left.to_timestamp(), right.to_timestamp()) {
                (Some(l), Some(r)) => Some(l.cmp(&r)),
                _ => None,
            }
        }
        (Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
        (Value::Text(_), Value::Date(_)) => match (left.to_timestamp(), right.to_timestamp()) {
            (Some(l), Some(r)) => Some(l.cmp(&r)),
            _ => None,
        },
        (Value::Time(_), Value::Time(_) | Value::Text(_)) | (Value::Text(_), Value::Time(_)) => {
            match (left.to_time(), right.to_time()) {
                (Some(l), Some(r)) => Some(l.cmp(&r)),
                _ => None,
            }
        }
        (Value::Geometry(_), _) | (_, Value::Geometry(_)) => None,
        (Value::List(_), _) | (_, Value::List(_)) => None,
        _ => match (Number::from_value(left), Number::from_value(right)) {
            (Some(l), Some(r)) => compare_numbers(&l, &r),
            _ => None,
        },
    };
    if result.is_none() {
        trace!(
            left = left.type_name(),
            right = right.type_name(),
            "values not comparable"
        );
    }
    result
}

/// Equality of two scalar values. `None` means the pair could not be
/// brought to a common kind.
///
/// Geometries compare by coordinates; text on the other side is read as WKT.
pub fn values_equal(left: &Value, right: &Value, match_case: bool) -> Option<bool> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Geometry(l), r) | (r, Value::Geometry(l)) => match r.to_geometry() {
            Some(r) => Some(l.geometry == r.geometry),
            None => {
                trace!(other = r.type_name(), "value is not a geometry");
                None
            }
        },
        (Value::List(l), Value::List(r)) => Some(l == r),
        _ => compare_values(left, right, match_case).map(|o| o == Ordering::Equal),
    }
}

fn compare_text(left: &str, right: &str, match_case: bool) -> Ordering {
    if match_case {
        left.cmp(right)
    } else {
        left.to_lowercase().cmp(&right.to_lowercase())
    }
}

// ──────────────────────────────────────────────
// Arithmetic
// ──────────────────────────────────────────────

/// Apply an arithmetic operator.
///
/// Integer operands stay integral and widen to `BigInt` on overflow. Any
/// float operand makes the result a `Double`. Decimal operands keep full
/// precision. Division of integers yields a `Double`. Null, lists,
/// non-numeric text, and division by zero all yield `Null`.
pub fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> Value {
    let (l, r) = match (Number::from_value(left), Number::from_value(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            trace!(
                ?op,
                left = left.type_name(),
                right = right.type_name(),
                "arithmetic operands are not numeric"
            );
            return Value::Null;
        }
    };
    let result = match (&l, &r) {
        (Number::Double(_), _) | (_, Number::Double(_)) => float_op(op, &l, &r),
        (Number::Long(a), Number::Long(b)) if op != ArithmeticOp::Divide => {
            Some(long_op(op, *a, *b))
        }
        _ if l.is_integral() && r.is_integral() && op != ArithmeticOp::Divide => {
            big_op(op, l.to_bigint(), r.to_bigint())
        }
        (Number::Long(_) | Number::Big(_), Number::Long(_) | Number::Big(_)) => {
            float_op(op, &l, &r)
        }
        _ => decimal_op(op, l.to_decimal(), r.to_decimal()),
    };
    result.map(Number::into_value).unwrap_or(Value::Null)
}

fn long_op(op: ArithmeticOp, a: i64, b: i64) -> Number {
    let checked = match op {
        ArithmeticOp::Add => a.checked_add(b),
        ArithmeticOp::Subtract => a.checked_sub(b),
        ArithmeticOp::Multiply => a.checked_mul(b),
        ArithmeticOp::Divide => None,
    };
    match checked {
        Some(v) => Number::Long(v),
        None => {
            let (a, b) = (BigInt::from(a), BigInt::from(b));
            Number::Big(match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                _ => a * b,
            })
        }
    }
}

fn big_op(op: ArithmeticOp, a: Option<BigInt>, b: Option<BigInt>) -> Option<Number> {
    let (a, b) = (a?, b?);
    let v = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => return None,
    };
    Some(Number::Big(v))
}

fn float_op(op: ArithmeticOp, a: &Number, b: &Number) -> Option<Number> {
    let (a, b) = (a.to_f64()?, b.to_f64()?);
    let v = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
    };
    Some(Number::Double(v))
}

fn decimal_op(op: ArithmeticOp, a: Option<BigDecimal>, b: Option<BigDecimal>) -> Option<Number> {
    let (a, b) = (a?, b?);
    let v = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => {
            if b.is_zero() {
                return None;
            }
            a / b
        }
    };
    Some(Number::Decimal(v))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn dec(s: &str) -> Value {
        Value::Decimal(BigDecimal::from_str(s).unwrap())
    }

    fn eq(l: Value, r: Value) -> Option<bool> {
        values_equal(&l, &r, true)
    }

    #[test]
    fn numeric_kinds_equal_across_widths() {
        let forms = vec![
            Value::Short(42),
            Value::Text("42".into()),
            Value::Double(42.0),
            Value::Float(42.0),
            Value::BigInt(BigInt::from(42)),
            dec("42"),
            Value::Byte(42),
        ];
        for l in &forms {
            for r in &forms {
                assert_eq!(values_equal(l, r, true), Some(true), "{:?} vs {:?}", l, r);
            }
        }
    }

    #[test]
    fn precision_loss_is_not_equal() {
        let wide = Value::Double(i64::MAX as f64 + 10000.0);
        assert_eq!(eq(wide.clone(), Value::Long(i64::MAX)), Some(false));
        assert_eq!(eq(Value::Long(i64::MAX), wide), Some(false));
    }

    #[test]
    fn large_integers_meet_floats_exactly() {
        let p60 = 1i64 << 60;
        assert_eq!(eq(Value::Double(p60 as f64), Value::Long(p60)), Some(true));
        assert_eq!(
            compare_values(&Value::Double(p60 as f64), &Value::Long(p60 + 1), true),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::BigInt(BigInt::from(p60) - 1), &Value::Double(p60 as f64), true),
            Some(Ordering::Less)
        );
        assert_eq!(eq(Value::Double(-(p60 as f64)), Value::Long(-p60)), Some(true));
    }

    #[test]
    fn exact_decimal_of_fractions_and_subnormals() {
        assert_eq!(exact_decimal(0.5), Some(BigDecimal::from_str("0.5").unwrap()));
        assert_eq!(
            exact_decimal(0.1),
            Some(BigDecimal::from_str("0.1000000000000000055511151231257827021181583404541015625").unwrap())
        );
        assert!(exact_decimal(f64::MIN_POSITIVE / 2.0).unwrap() > BigDecimal::from(0));
        assert_eq!(exact_decimal(f64::NAN), None);
    }

    #[test]
    fn float_decimal_uses_shortest_form() {
        assert_eq!(eq(Value::Double(0.1), dec("0.1")), Some(true));
        assert_eq!(eq(Value::Float(0.1), Value::Double(0.1)), Some(true));
        assert_eq!(eq(Value::Text("0.10".into()), Value::Double(0.1)), Some(true));
    }

    #[test]
    fn ordering_across_kinds() {
        assert_eq!(
            compare_values(&Value::Int(5), &Value::Double(5.5), true),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::BigInt(BigInt::from(10).pow(30)), &Value::Long(i64::MAX), true),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&Value::Double(f64::INFINITY), &dec("1e400"), true),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&Value::Double(f64::NAN), &Value::Long(1), true), None);
    }

    #[test]
    fn unparsable_text_not_comparable() {
        assert_eq!(eq(Value::Text("abc".into()), Value::Long(1)), None);
        assert_eq!(compare_values(&Value::Long(1), &Value::Text("1x".into()), true), None);
    }

    #[test]
    fn null_never_comparable() {
        assert_eq!(eq(Value::Null, Value::Null), None);
        assert_eq!(compare_values(&Value::Null, &Value::Long(1), true), None);
    }

    #[test]
    fn text_case_sensitivity() {
        let l = Value::Text("Road".into());
        let r = Value::Text("ROAD".into());
        assert_eq!(values_equal(&l, &r, true), Some(false));
        assert_eq!(values_equal(&l, &r, false), Some(true));
        assert_eq!(
            values_equal(&Value::Text("Barañá".into()), &Value::Text("BARAÑÁ".into()), false),
            Some(true)
        );
    }

    #[test]
    fn text_against_text_is_lexical() {
        assert_eq!(
            compare_values(&Value::Text("10".into()), &Value::Text("9".into()), true),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn temporal_coercion() {
        assert_eq!(eq(Value::Date(date!(2020 - 01 - 02)), Value::Text("2020-01-02".into())), Some(true));
        assert_eq!(
            compare_values(
                &Value::Date(date!(2020 - 01 - 02)),
                &Value::Timestamp(datetime!(2020-01-02 12:00)),
                true
            ),
            Some(Ordering::Less)
        );
        assert_eq!(eq(Value::Text("not a date".into()), Value::Date(date!(2020 - 01 - 02))), None);
    }

    #[test]
    fn bool_coercion() {
        assert_eq!(eq(Value::Bool(true), Value::Text("TRUE".into())), Some(true));
        assert_eq!(eq(Value::Bool(true), Value::Long(1)), None);
    }

    #[test]
    fn geometry_equality_reads_wkt() {
        let g = Value::Text("POINT (1 1)".into()).convert_to(ValueKind::Geometry).unwrap();
        assert_eq!(eq(g.clone(), Value::Text("POINT (1 1)".into())), Some(true));
        assert_eq!(eq(g.clone(), Value::Text("POINT (1 2)".into())), Some(false));
        assert_eq!(compare_values(&g, &g, true), None);
    }

    #[test]
    fn integer_arithmetic_widens_on_overflow() {
        assert_eq!(arithmetic(ArithmeticOp::Add, &Value::Int(2), &Value::Short(3)), Value::Long(5));
        let big = arithmetic(ArithmeticOp::Multiply, &Value::Long(i64::MAX), &Value::Long(2));
        assert_eq!(big, Value::BigInt(BigInt::from(i64::MAX) * 2));
    }

    #[test]
    fn division_results() {
        assert_eq!(arithmetic(ArithmeticOp::Divide, &Value::Long(10), &Value::Long(4)), Value::Double(2.5));
        assert_eq!(arithmetic(ArithmeticOp::Divide, &dec("1.5"), &dec("0.5")), dec("3"));
        assert_eq!(arithmetic(ArithmeticOp::Divide, &Value::Long(1), &Value::Long(0)), Value::Null);
        assert_eq!(arithmetic(ArithmeticOp::Divide, &dec("1"), &dec("0")), Value::Null);
    }

    #[test]
    fn mixed_arithmetic() {
        assert_eq!(arithmetic(ArithmeticOp::Subtract, &Value::Double(1.5), &Value::Long(1)), Value::Double(0.5));
        assert_eq!(arithmetic(ArithmeticOp::Add, &dec("0.1"), &dec("0.2")), dec("0.3"));
        assert_eq!(arithmetic(ArithmeticOp::Add, &Value::Text("2".into()), &Value::Long(3)), Value::Long(5));
        assert_eq!(arithmetic(ArithmeticOp::Add, &Value::Null, &Value::Long(3)), Value::Null);
        assert_eq!(arithmetic(ArithmeticOp::Add, &Value::Text("x".into()), &Value::Long(3)), Value::Null);
    }
}
