//! Built-in functions: math, string, membership and geometry.
//!
//! Every function returns `Value::Null` for null or mistyped arguments.

use std::cmp::Ordering;

use geo::{AffineOps, AffineTransform, Area, BoundingRect, Translate};
use geo_types::{coord, Geometry, Rect};
use num_traits::Signed;

use super::{FunctionDescriptor, FunctionImpl, FunctionParameter, FunctionRegistry, ParameterType};
use crate::expression::Expression;
use crate::numeric::{self, Number};
use crate::record::Record;
use crate::spatial;
use crate::types::{GeometryValue, Value};

/// Register every built-in function.
pub fn register_all(registry: &mut FunctionRegistry) {
    register_math(registry);
    register_string(registry);
    register_geometry(registry);
    registry.register(
        FunctionDescriptor::new(
            "in",
            vec![
                FunctionParameter::required("candidate", ParameterType::Any),
                FunctionParameter::repeated("values", ParameterType::Any, 1),
            ],
            ParameterType::Bool,
        ),
        In,
    );
}

fn one(name: &str, kind: ParameterType, returns: ParameterType) -> FunctionDescriptor {
    FunctionDescriptor::new(name, vec![FunctionParameter::required("value", kind)], returns)
}

fn two(name: &str, a: &str, b: &str, kind: ParameterType, returns: ParameterType) -> FunctionDescriptor {
    FunctionDescriptor::new(
        name,
        vec![
            FunctionParameter::required(a, kind),
            FunctionParameter::required(b, kind),
        ],
        returns,
    )
}

fn number_arg(args: &[Value], index: usize) -> Option<f64> {
    args.get(index).and_then(Value::to_f64)
}

fn geometry_arg(args: &[Value], index: usize) -> Option<GeometryValue> {
    args.get(index).and_then(Value::to_geometry)
}

/// Evaluate a constant argument expression to a float.
fn constant_number(args: &[Expression], index: usize) -> Option<f64> {
    args.get(index).and_then(|e| e.evaluate(&()).to_f64())
}

// ──────────────────────────────────────────────
// Math
// ──────────────────────────────────────────────

struct UnaryMath(fn(f64) -> f64);

impl FunctionImpl for UnaryMath {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        number_arg(args, 0)
            .map(|x| Value::Double((self.0)(x)))
            .unwrap_or(Value::Null)
    }
}

struct BinaryMath(fn(f64, f64) -> f64);

impl FunctionImpl for BinaryMath {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        match (number_arg(args, 0), number_arg(args, 1)) {
            (Some(a), Some(b)) => Value::Double((self.0)(a, b)),
            _ => Value::Null,
        }
    }
}

/// `min`/`max`: returns whichever argument wins, keeping its kind.
struct Extreme(Ordering);

impl FunctionImpl for Extreme {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
            return Value::Null;
        };
        let (Some(na), Some(nb)) = (Number::from_value(a), Number::from_value(b)) else {
            return Value::Null;
        };
        match numeric::compare_numbers(&na, &nb) {
            Some(o) if o == self.0 => na.into_value(),
            Some(_) => nb.into_value(),
            None => Value::Null,
        }
    }
}

fn abs(args: &[Value]) -> Value {
    match args.first().and_then(Number::from_value) {
        Some(Number::Long(v)) => v
            .checked_abs()
            .map(Value::Long)
            .unwrap_or_else(|| Value::BigInt(num_bigint::BigInt::from(v).abs())),
        Some(Number::Big(v)) => Value::BigInt(v.abs()),
        Some(Number::Double(v)) => Value::Double(v.abs()),
        Some(Number::Decimal(v)) => Value::Decimal(v.abs()),
        None => Value::Null,
    }
}

/// Half-up rounding to a whole number: ties go toward positive infinity,
/// so -2.5 rounds to -2.
fn round(args: &[Value]) -> Value {
    match number_arg(args, 0) {
        Some(x) if x.is_finite() => {
            // `x - floor(x)` is exact, unlike `x + 0.5`.
            let floor = x.floor();
            let r = if x - floor >= 0.5 { floor + 1.0 } else { floor };
            if r >= i64::MIN as f64 && r < i64::MAX as f64 {
                Value::Long(r as i64)
            } else {
                Value::Double(r)
            }
        }
        Some(x) => Value::Double(x),
        None => Value::Null,
    }
}

fn register_math(registry: &mut FunctionRegistry) {
    use ParameterType::Number as N;

    let unary: [(&str, fn(f64) -> f64); 11] = [
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("toDegrees", f64::to_degrees),
        ("toRadians", f64::to_radians),
        ("atan", f64::atan),
    ];
    for (name, f) in unary {
        registry.register(one(name, N, N), UnaryMath(f));
    }
    registry.register(two("pow", "base", "exponent", N, N), BinaryMath(f64::powf));
    registry.register(two("atan2", "y", "x", N, N), BinaryMath(f64::atan2));
    registry.register(two("min", "a", "b", N, N), Extreme(Ordering::Less));
    registry.register(two("max", "a", "b", N, N), Extreme(Ordering::Greater));
    registry.register(one("abs", N, N), |args: &[Value]| abs(args));
    registry.register(one("round", N, ParameterType::Integer), |args: &[Value]| round(args));
}

// ──────────────────────────────────────────────
// Strings
// ──────────────────────────────────────────────

fn text_arg(args: &[Value], index: usize) -> Option<String> {
    match args.get(index) {
        None | Some(Value::Null) | Some(Value::List(_)) => None,
        Some(v) => Some(v.to_string()),
    }
}

fn register_string(registry: &mut FunctionRegistry) {
    use ParameterType::Text as T;

    registry.register(two("strConcat", "a", "b", T, T), |args: &[Value]| {
        match (text_arg(args, 0), text_arg(args, 1)) {
            (Some(a), Some(b)) => Value::Text(a + &b),
            _ => Value::Null,
        }
    });
    registry.register(one("strToLowerCase", T, T), |args: &[Value]| {
        text_arg(args, 0)
            .map(|s| Value::Text(s.to_lowercase()))
            .unwrap_or(Value::Null)
    });
    registry.register(one("strToUpperCase", T, T), |args: &[Value]| {
        text_arg(args, 0)
            .map(|s| Value::Text(s.to_uppercase()))
            .unwrap_or(Value::Null)
    });
    registry.register(one("strTrim", T, T), |args: &[Value]| {
        text_arg(args, 0)
            .map(|s| Value::Text(s.trim().to_string()))
            .unwrap_or(Value::Null)
    });
    registry.register(one("strLength", T, ParameterType::Integer), |args: &[Value]| {
        text_arg(args, 0)
            .map(|s| Value::Int(s.chars().count() as i32))
            .unwrap_or(Value::Null)
    });
}

// ──────────────────────────────────────────────
// Membership
// ──────────────────────────────────────────────

/// `in(candidate, v1, v2, ...)`: true when the candidate equals any value.
/// List arguments contribute each of their elements.
struct In;

impl FunctionImpl for In {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        let Some((candidate, values)) = args.split_first() else {
            return Value::Null;
        };
        if candidate.is_null() {
            return Value::Bool(false);
        }
        let found = values.iter().any(|v| match v {
            Value::List(items) => items
                .iter()
                .any(|item| numeric::values_equal(candidate, item, true) == Some(true)),
            other => numeric::values_equal(candidate, other, true) == Some(true),
        });
        Value::Bool(found)
    }
}

// ──────────────────────────────────────────────
// Geometry
// ──────────────────────────────────────────────

/// `envelope(geometry)`: the bounding rectangle.
struct Envelope;

impl FunctionImpl for Envelope {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        let Some(g) = geometry_arg(args, 0) else {
            return Value::Null;
        };
        match g.geometry.bounding_rect() {
            Some(rect) => Value::Geometry(GeometryValue::new(Geometry::Rect(rect)).with_crs(g.crs)),
            None => Value::Null,
        }
    }

    fn invert_envelope(&self, _args: &[Expression], target: Rect<f64>) -> Option<Rect<f64>> {
        Some(target)
    }
}

/// `offset(geometry, dx, dy)`: translate.
struct Offset;

impl FunctionImpl for Offset {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        match (geometry_arg(args, 0), number_arg(args, 1), number_arg(args, 2)) {
            (Some(g), Some(dx), Some(dy)) => Value::Geometry(GeometryValue {
                geometry: g.geometry.translate(dx, dy),
                crs: g.crs,
            }),
            _ => Value::Null,
        }
    }

    fn invert_envelope(&self, args: &[Expression], target: Rect<f64>) -> Option<Rect<f64>> {
        let dx = constant_number(args, 1)?;
        let dy = constant_number(args, 2)?;
        Some(Rect::new(
            coord! { x: target.min().x - dx, y: target.min().y - dy },
            coord! { x: target.max().x - dx, y: target.max().y - dy },
        ))
    }
}

/// `scale(geometry, sx, sy)`: scale about the origin.
struct Scale;

impl FunctionImpl for Scale {
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        match (geometry_arg(args, 0), number_arg(args, 1), number_arg(args, 2)) {
            (Some(g), Some(sx), Some(sy)) => {
                let transform = AffineTransform::scale(sx, sy, coord! { x: 0.0, y: 0.0 });
                Value::Geometry(GeometryValue {
                    geometry: g.geometry.affine_transform(&transform),
                    crs: g.crs,
                })
            }
            _ => Value::Null,
        }
    }

    fn invert_envelope(&self, args: &[Expression], target: Rect<f64>) -> Option<Rect<f64>> {
        let sx = constant_number(args, 1)?;
        let sy = constant_number(args, 2)?;
        if sx == 0.0 || sy == 0.0 {
            return None;
        }
        Some(Rect::new(
            coord! { x: target.min().x / sx, y: target.min().y / sy },
            coord! { x: target.max().x / sx, y: target.max().y / sy },
        ))
    }
}

fn register_geometry(registry: &mut FunctionRegistry) {
    use ParameterType::{Geometry as G, Number as N};

    registry.register(one("area", G, N), |args: &[Value]| {
        geometry_arg(args, 0)
            .map(|g| Value::Double(g.geometry.unsigned_area()))
            .unwrap_or(Value::Null)
    });
    registry.register(two("distance", "a", "b", G, N), |args: &[Value]| {
        match (geometry_arg(args, 0), geometry_arg(args, 1)) {
            (Some(a), Some(b)) => Value::Double(spatial::planar_distance(&a.geometry, &b.geometry)),
            _ => Value::Null,
        }
    });
    registry.register(one("envelope", G, G), Envelope);
    let transform = |name: &str, x: &str, y: &str| {
        FunctionDescriptor::new(
            name,
            vec![
                FunctionParameter::required("geometry", G),
                FunctionParameter::required(x, N),
                FunctionParameter::required(y, N),
            ],
            G,
        )
    };
    registry.register(transform("offset", "dx", "dy"), Offset);
    registry.register(transform("scale", "sx", "sy"), Scale);
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MapRecord;

    fn call(name: &str, args: Vec<Expression>) -> Value {
        FunctionRegistry::with_builtins()
            .call(name, args)
            .unwrap()
            .evaluate(&())
    }

    fn lit(v: impl Into<Value>) -> Expression {
        Expression::literal(v)
    }

    fn close(v: Value, expected: f64) -> bool {
        v.to_f64().map_or(false, |x| (x - expected).abs() < 1e-9)
    }

    #[test]
    fn math_functions() {
        assert!(close(call("sin", vec![lit(0.0)]), 0.0));
        assert!(close(call("cos", vec![lit(0.0)]), 1.0));
        assert!(close(call("tan", vec![lit(0.0)]), 0.0));
        assert!(close(call("atan2", vec![lit(1.0), lit(1.0)]), std::f64::consts::FRAC_PI_4));
        assert!(close(call("sqrt", vec![lit(16i32)]), 4.0));
        assert!(close(call("pow", vec![lit(2i32), lit(10i32)]), 1024.0));
        assert!(close(call("exp", vec![lit(0i32)]), 1.0));
        assert!(close(call("log", vec![lit(1i32)]), 0.0));
        assert!(close(call("ceil", vec![lit(1.2)]), 2.0));
        assert!(close(call("floor", vec![lit(1.8)]), 1.0));
        assert!(close(call("toDegrees", vec![lit(std::f64::consts::PI)]), 180.0));
        assert!(close(call("toRadians", vec![lit(180i32)]), std::f64::consts::PI));
    }

    #[test]
    fn abs_round_min_max_keep_kinds() {
        assert_eq!(call("abs", vec![lit(-5i32)]), Value::Long(5));
        assert_eq!(call("abs", vec![lit(-2.5)]), Value::Double(2.5));
        assert_eq!(call("round", vec![lit(2.5)]), Value::Long(3));
        assert_eq!(call("round", vec![lit(-2.5)]), Value::Long(-2));
        assert_eq!(call("round", vec![lit(0.49999999999999994)]), Value::Long(0));
        assert_eq!(call("round", vec![lit(-0.49999999999999994)]), Value::Long(0));
        let odd = 4503599627370497.0; // 2^52 + 1
        assert_eq!(call("round", vec![lit(odd)]), Value::Long(4503599627370497));
        assert_eq!(call("min", vec![lit(3i32), lit(1.5)]), Value::Double(1.5));
        assert_eq!(call("max", vec![lit(3i32), lit(1.5)]), Value::Long(3));
    }

    #[test]
    fn math_on_bad_input_is_null() {
        assert_eq!(call("sqrt", vec![lit("abc")]), Value::Null);
        assert_eq!(call("sqrt", vec![lit(Value::Null)]), Value::Null);
        assert_eq!(call("sqrt", vec![lit("9")]), Value::Double(3.0));
    }

    #[test]
    fn string_functions() {
        assert_eq!(call("strConcat", vec![lit("ab"), lit(1i32)]), Value::Text("ab1".into()));
        assert_eq!(call("strToLowerCase", vec![lit("RoAd")]), Value::Text("road".into()));
        assert_eq!(call("strToUpperCase", vec![lit("RoAd")]), Value::Text("ROAD".into()));
        assert_eq!(call("strTrim", vec![lit("  x ")]), Value::Text("x".into()));
        assert_eq!(call("strLength", vec![lit("añb")]), Value::Int(3));
        assert_eq!(call("strConcat", vec![lit(Value::Null), lit("x")]), Value::Null);
    }

    #[test]
    fn membership() {
        assert_eq!(call("in", vec![lit(2i32), lit(1i32), lit("2")]), Value::Bool(true));
        assert_eq!(call("in", vec![lit("c"), lit("a"), lit("b")]), Value::Bool(false));
        assert_eq!(
            call("in", vec![lit("b"), lit(vec!["a", "b"])]),
            Value::Bool(true)
        );
    }

    #[test]
    fn geometry_functions() {
        let square = lit("POLYGON ((0 0, 2 0, 2 2, 0 2, 0 0))");
        assert!(close(call("area", vec![square.clone()]), 4.0));
        assert!(close(call("distance", vec![lit("POINT (0 0)"), lit("POINT (3 4)")]), 5.0));

        let moved = call("offset", vec![lit("POINT (1 1)"), lit(2i32), lit(3i32)]);
        assert_eq!(moved, Value::Text("POINT (3 4)".into()).to_geometry().map(Value::Geometry).unwrap());

        let scaled = call("scale", vec![lit("POINT (1 2)"), lit(2i32), lit(3i32)]);
        assert_eq!(scaled, Value::Text("POINT (2 6)".into()).to_geometry().map(Value::Geometry).unwrap());

        let env = call("envelope", vec![square]);
        match env {
            Value::Geometry(g) => assert!(matches!(g.geometry, Geometry::Rect(_))),
            other => panic!("expected geometry, got {:?}", other),
        }
    }

    #[test]
    fn functions_read_properties() {
        let registry = FunctionRegistry::with_builtins();
        let r = MapRecord::new().with("name", "Main St");
        let upper = registry
            .call("strToUpperCase", vec![Expression::property("name")])
            .unwrap();
        assert_eq!(upper.evaluate(&r), Value::Text("MAIN ST".into()));
    }

    #[test]
    fn offset_and_scale_invert() {
        let target = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
        let args = vec![Expression::property("geom"), lit(5i32), lit(-5i32)];
        let inverted = Offset.invert_envelope(&args, target).unwrap();
        assert_eq!(inverted.min(), coord! { x: -5.0, y: 5.0 });
        assert_eq!(inverted.max(), coord! { x: 5.0, y: 15.0 });

        let args = vec![Expression::property("geom"), lit(2i32), lit(-2i32)];
        let inverted = Scale.invert_envelope(&args, target).unwrap();
        assert_eq!(inverted.min(), coord! { x: 0.0, y: -5.0 });
        assert_eq!(inverted.max(), coord! { x: 5.0, y: 0.0 });

        let args = vec![Expression::property("geom"), lit(0i32), lit(1i32)];
        assert!(Scale.invert_envelope(&args, target).is_none());
    }
}
