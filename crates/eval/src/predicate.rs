//! Filter evaluator.
//!
//! A stateless tree interpreter. Every operator that takes expression
//! operands first expands multi-valued operands into combinations (see
//! [`MatchAction`]) and then applies the operator to each combination.
//! Bad record data never aborts evaluation: a null, missing or
//! uncoercible operand simply fails the single test it feeds.

use std::cmp::Ordering;

use tracing::trace;

use crate::filter::{CompareOp, Filter, MatchAction};
use crate::numeric::{compare_values, values_equal};
use crate::record::Record;
use crate::spatial::{self, GeometryOps};
use crate::types::Value;

/// Evaluate a filter against a record.
pub fn eval_filter(filter: &Filter, record: &dyn Record, ops: &dyn GeometryOps) -> bool {
    match filter {
        Filter::Include => true,
        Filter::Exclude => false,

        Filter::Compare(c) => {
            let operands = [c.left.evaluate(record), c.right.evaluate(record)];
            c.match_action
                .apply(&operands, |v| compare(c.op, v[0], v[1], c.match_case))
        }

        Filter::Between(b) => {
            let operands = [
                b.expr.evaluate(record),
                b.lower.evaluate(record),
                b.upper.evaluate(record),
            ];
            b.match_action.apply(&operands, |v| {
                compare(CompareOp::GreaterOrEqual, v[0], v[1], true)
                    && compare(CompareOp::LessOrEqual, v[0], v[2], true)
            })
        }

        Filter::Like(l) => {
            let operands = [l.expr.evaluate(record)];
            l.match_action.apply(&operands, |v| match v[0] {
                Value::Null => false,
                Value::Text(s) => l.pattern.is_match(s),
                other => l.pattern.is_match(&other.to_string()),
            })
        }

        Filter::IsNull(expr) => expr.evaluate(record).is_null(),

        Filter::Spatial(s) => {
            let operands = [s.left.evaluate(record), s.right.evaluate(record)];
            s.match_action.apply(&operands, |v| {
                match (v[0].to_geometry(), v[1].to_geometry()) {
                    (Some(a), Some(b)) => spatial::evaluate(ops, s.op, s.distance.as_ref(), &a, &b),
                    _ => {
                        trace!(
                            op = ?s.op,
                            left = v[0].type_name(),
                            right = v[1].type_name(),
                            "spatial operand is not a geometry"
                        );
                        false
                    }
                }
            })
        }

        // `all`/`any` stop at the first deciding child, so later children
        // are never evaluated once the result is known.
        Filter::And(children) => children.iter().all(|c| eval_filter(c, record, ops)),
        Filter::Or(children) => children.iter().any(|c| eval_filter(c, record, ops)),
        Filter::Not(child) => !eval_filter(child, record, ops),

        Filter::Id(ids) => record.id().is_some_and(|id| ids.contains(id)),
    }
}

/// One relational test on a single combination of scalar operands.
///
/// Null on either side fails every operator, `NotEqual` included. Two
/// non-null values with no common kind are unequal.
fn compare(op: CompareOp, left: &Value, right: &Value, match_case: bool) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        CompareOp::Equal => values_equal(left, right, match_case) == Some(true),
        CompareOp::NotEqual => values_equal(left, right, match_case) != Some(true),
        CompareOp::Less => compare_values(left, right, match_case) == Some(Ordering::Less),
        CompareOp::LessOrEqual => matches!(
            compare_values(left, right, match_case),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Greater => compare_values(left, right, match_case) == Some(Ordering::Greater),
        CompareOp::GreaterOrEqual => matches!(
            compare_values(left, right, match_case),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

impl MatchAction {
    /// Expand list operands into every combination of their elements and
    /// decide the result according to this action.
    ///
    /// Combinations are produced one at a time and evaluation stops as soon
    /// as the outcome is known: the first hit for `Any`, the first miss for
    /// `All`, the second hit for `One`.
    pub fn apply<F>(&self, operands: &[Value], test: F) -> bool
    where
        F: Fn(&[&Value]) -> bool,
    {
        let mut combos = Combinations::new(operands);
        match self {
            MatchAction::Any => {
                while let Some(c) = combos.next_combination() {
                    if test(c) {
                        return true;
                    }
                }
                false
            }
            MatchAction::All => {
                let mut seen = false;
                while let Some(c) = combos.next_combination() {
                    if !test(c) {
                        return false;
                    }
                    seen = true;
                }
                seen
            }
            MatchAction::One => {
                let mut hits = 0;
                while let Some(c) = combos.next_combination() {
                    if test(c) {
                        hits += 1;
                        if hits > 1 {
                            return false;
                        }
                    }
                }
                hits == 1
            }
        }
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::List(items) => items.iter().for_each(|item| flatten(item, out)),
        other => out.push(other),
    }
}

/// Cross product of the operands, lists expanded (nested lists flattened),
/// walked like an odometer with the last operand turning fastest. One
/// buffer is reused for every combination.
struct Combinations<'a> {
    choices: Vec<Vec<&'a Value>>,
    cursor: Vec<usize>,
    current: Vec<&'a Value>,
    started: bool,
    done: bool,
}

impl<'a> Combinations<'a> {
    fn new(operands: &'a [Value]) -> Self {
        let choices: Vec<Vec<&'a Value>> = operands
            .iter()
            .map(|operand| {
                let mut out = Vec::new();
                flatten(operand, &mut out);
                out
            })
            .collect();
        // An empty list on any side leaves nothing to combine.
        let done = choices.iter().any(Vec::is_empty);
        let current = if done {
            Vec::new()
        } else {
            choices.iter().map(|c| c[0]).collect()
        };
        Combinations {
            cursor: vec![0; choices.len()],
            choices,
            current,
            started: false,
            done,
        }
    }

    fn next_combination(&mut self) -> Option<&[&'a Value]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.current.as_slice());
        }
        for slot in (0..self.choices.len()).rev() {
            self.cursor[slot] += 1;
            if self.cursor[slot] < self.choices[slot].len() {
                self.current[slot] = self.choices[slot][self.cursor[slot]];
                return Some(self.current.as_slice());
            }
            self.cursor[slot] = 0;
            self.current[slot] = self.choices[slot][0];
        }
        self.done = true;
        None
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LikeLimits;
    use crate::expression::Expression;
    use crate::like::LikePattern;
    use crate::record::MapRecord;
    use crate::spatial::{Distance, DistanceUnit, SpatialOp};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn prop(name: &str) -> Expression {
        Expression::property(name)
    }

    fn lit(v: impl Into<Value>) -> Expression {
        Expression::literal(v)
    }

    fn cmp(op: CompareOp, l: Expression, r: Expression) -> Filter {
        Filter::compare(op, l, r)
    }

    fn record() -> MapRecord {
        MapRecord::new()
            .with_id("road.7")
            .with("name", "Main Street")
            .with("lanes", 4i32)
            .with("speed", 50.5f64)
            .with("closed", Value::Null)
            .with("geom", "LINESTRING (0 0, 10 0)")
    }

    #[test]
    fn include_exclude() {
        assert!(Filter::Include.evaluate(&()));
        assert!(!Filter::Exclude.evaluate(&()));
    }

    #[test]
    fn comparisons_coerce_literals() {
        let r = record();
        assert!(cmp(CompareOp::Equal, prop("lanes"), lit("4")).evaluate(&r));
        assert!(cmp(CompareOp::Equal, prop("lanes"), lit(4.0)).evaluate(&r));
        assert!(cmp(CompareOp::Less, prop("lanes"), lit(4.5)).evaluate(&r));
        assert!(cmp(CompareOp::GreaterOrEqual, prop("speed"), lit("50.5")).evaluate(&r));
        assert!(!cmp(CompareOp::Greater, prop("speed"), lit("fast")).evaluate(&r));
        assert!(cmp(CompareOp::NotEqual, prop("lanes"), lit(5i32)).evaluate(&r));
    }

    #[test]
    fn null_operand_fails_every_operator() {
        let r = record();
        for op in [
            CompareOp::Equal,
            CompareOp::NotEqual,
            CompareOp::Less,
            CompareOp::LessOrEqual,
            CompareOp::Greater,
            CompareOp::GreaterOrEqual,
        ] {
            assert!(!cmp(op, prop("closed"), lit(1i32)).evaluate(&r), "{:?}", op);
            assert!(!cmp(op, prop("missing"), lit(1i32)).evaluate(&r), "{:?}", op);
        }
    }

    #[test]
    fn incomparable_values_are_not_equal() {
        let r = record();
        assert!(cmp(CompareOp::NotEqual, prop("name"), lit(3i32)).evaluate(&r));
        assert!(!cmp(CompareOp::Equal, prop("name"), lit(3i32)).evaluate(&r));
    }

    #[test]
    fn match_case_on_text() {
        let r = record();
        let f = cmp(CompareOp::Equal, prop("name"), lit("main street"));
        assert!(!f.evaluate(&r));
        let f = f.with_match_case(false, &LikeLimits::default()).unwrap();
        assert!(f.evaluate(&r));
    }

    #[test]
    fn between_is_inclusive() {
        let r = record();
        assert!(Filter::between(prop("lanes"), lit(4i32), lit(6i32)).evaluate(&r));
        assert!(Filter::between(prop("lanes"), lit(2i32), lit("4")).evaluate(&r));
        assert!(!Filter::between(prop("lanes"), lit(5i32), lit(6i32)).evaluate(&r));
        assert!(!Filter::between(prop("closed"), lit(0i32), lit(6i32)).evaluate(&r));
    }

    #[test]
    fn like_on_properties() {
        let r = record();
        let limits = LikeLimits::default();
        let p = LikePattern::new("Main*", "*", ".", "!", true, &limits).unwrap();
        assert!(Filter::like(prop("name"), p).evaluate(&r));
        let p = LikePattern::new("4", "*", ".", "!", true, &limits).unwrap();
        assert!(Filter::like(prop("lanes"), p.clone()).evaluate(&r));
        assert!(!Filter::like(prop("closed"), p).evaluate(&r));
    }

    #[test]
    fn is_null_distinguishes_null() {
        let r = record();
        assert!(Filter::is_null(prop("closed")).evaluate(&r));
        assert!(Filter::is_null(prop("missing")).evaluate(&r));
        assert!(!Filter::is_null(prop("name")).evaluate(&r));
    }

    #[test]
    fn logic_short_circuits_null_guard() {
        let r = record();
        let guarded = Filter::and(vec![
            Filter::not(Filter::is_null(prop("closed"))),
            cmp(CompareOp::Equal, prop("closed"), lit(true)),
        ]);
        assert!(!guarded.evaluate(&r));
        let either = Filter::or(vec![
            Filter::is_null(prop("closed")),
            cmp(CompareOp::Equal, prop("closed"), lit(true)),
        ]);
        assert!(either.evaluate(&r));
        assert!(Filter::not(Filter::Exclude).evaluate(&r));
    }

    struct CountingOps(AtomicUsize);

    impl GeometryOps for CountingOps {
        fn test(&self, op: SpatialOp, l: &geo_types::Geometry<f64>, r: &geo_types::Geometry<f64>) -> bool {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            crate::spatial::GeoOps.test(op, l, r)
        }

        fn distance(&self, l: &geo_types::Geometry<f64>, r: &geo_types::Geometry<f64>) -> f64 {
            crate::spatial::GeoOps.distance(l, r)
        }
    }

    #[test]
    fn decided_and_skips_later_children() {
        let ops = CountingOps(AtomicUsize::new(0));
        let spatial = Filter::spatial(SpatialOp::Intersects, prop("geom"), lit("POINT (5 0)")).unwrap();
        let f = Filter::and(vec![Filter::Exclude, spatial.clone()]);
        assert!(!f.evaluate_with(&record(), &ops));
        assert_eq!(ops.0.load(AtomicOrdering::SeqCst), 0);
        let f = Filter::or(vec![Filter::Include, spatial.clone()]);
        assert!(f.evaluate_with(&record(), &ops));
        assert_eq!(ops.0.load(AtomicOrdering::SeqCst), 0);
        assert!(spatial.evaluate_with(&record(), &ops));
        assert_eq!(ops.0.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn id_filter() {
        let r = record();
        assert!(Filter::id(["road.7", "road.8"]).evaluate(&r));
        assert!(!Filter::id(["road.8"]).evaluate(&r));
        assert!(!Filter::id(Vec::<String>::new()).evaluate(&r));
        assert!(!Filter::id(["road.7"]).evaluate(&MapRecord::new()));
    }

    #[test]
    fn spatial_on_properties() {
        let r = record();
        let f = Filter::spatial(SpatialOp::Intersects, prop("geom"), lit("POINT (5 0)")).unwrap();
        assert!(f.evaluate(&r));
        let f = Filter::spatial(SpatialOp::Intersects, prop("name"), lit("POINT (5 0)")).unwrap();
        assert!(!f.evaluate(&r));
        let f = Filter::spatial(SpatialOp::Intersects, prop("geom"), lit(Value::Null)).unwrap();
        assert!(!f.evaluate(&r));
        let f = Filter::bbox(prop("geom"), (4.0, -1.0), (6.0, 1.0), Some("EPSG:4326"));
        assert!(f.evaluate(&r));
        let f = Filter::bbox(prop("geom"), (4.0, 1.0), (6.0, 2.0), None);
        assert!(!f.evaluate(&r));
    }

    #[test]
    fn dwithin_null_literal_is_false() {
        let d = Distance::new(20.0, DistanceUnit::Metre);
        let f = Filter::distance(SpatialOp::DWithin, prop("geom"), lit(Value::Null), d).unwrap();
        assert!(!f.evaluate(&record()));
    }

    #[test]
    fn dwithin_polygon_threshold() {
        let r = MapRecord::new().with("geom", "POINT (0 0)");
        let square = lit("POLYGON ((10 10, 15 10, 15 15, 10 15, 10 10))");
        let near = Filter::distance(
            SpatialOp::DWithin,
            prop("geom"),
            square.clone(),
            Distance::new(20.0, DistanceUnit::Metre),
        )
        .unwrap();
        let far = Filter::distance(
            SpatialOp::DWithin,
            prop("geom"),
            square,
            Distance::new(2.0, DistanceUnit::Metre),
        )
        .unwrap();
        assert!(near.evaluate(&r));
        assert!(!far.evaluate(&r));
    }

    fn all_combinations(operands: &[Value]) -> Vec<Vec<&Value>> {
        let mut combos = Combinations::new(operands);
        let mut out = Vec::new();
        while let Some(c) = combos.next_combination() {
            out.push(c.to_vec());
        }
        out
    }

    #[test]
    fn combinations_cross_product() {
        let operands = [
            Value::from(vec![1i32, 2]),
            Value::Int(9),
            Value::List(vec![Value::Int(3), Value::List(vec![Value::Int(4)])]),
        ];
        let combos = all_combinations(&operands);
        assert_eq!(combos.len(), 4);
        assert_eq!(combos[0], vec![&Value::Int(1), &Value::Int(9), &Value::Int(3)]);
        assert_eq!(combos[1], vec![&Value::Int(1), &Value::Int(9), &Value::Int(4)]);
        assert_eq!(combos[3], vec![&Value::Int(2), &Value::Int(9), &Value::Int(4)]);
        assert!(all_combinations(&[Value::List(vec![]), Value::Int(1)]).is_empty());
        assert_eq!(all_combinations(&[]).len(), 1);
    }

    fn long_list(len: i32) -> Value {
        Value::List((0..len).map(Value::Int).collect())
    }

    #[test]
    fn match_actions_stop_once_decided() {
        let operands = [long_list(3000), long_list(3000)];
        let calls = Cell::new(0usize);
        let equal = |v: &[&Value]| {
            calls.set(calls.get() + 1);
            v[0] == v[1]
        };

        assert!(MatchAction::Any.apply(&operands, equal));
        assert_eq!(calls.get(), 1);

        calls.set(0);
        assert!(!MatchAction::All.apply(&operands, equal));
        assert_eq!(calls.get(), 2);

        // (0, 0) hits, then (1, 1) is the second hit after 3000 more tests.
        calls.set(0);
        assert!(!MatchAction::One.apply(&operands, equal));
        assert_eq!(calls.get(), 3002);
    }

    #[test]
    fn any_over_large_record_lists() {
        let r = MapRecord::new()
            .with("a", long_list(3000))
            .with("b", long_list(3000));
        assert!(cmp(CompareOp::Equal, prop("a"), prop("b")).evaluate(&r));
        assert!(cmp(CompareOp::Less, prop("a"), prop("b")).evaluate(&r));
    }
}
