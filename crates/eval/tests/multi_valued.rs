//! Multi-valued attribute semantics.
//!
//! Records carry list-valued attributes (JSON arrays or `Value::List`).
//! Every operator expands list operands into their combinations once and
//! then applies the match action: `Any` needs one satisfying combination,
//! `All` needs every combination, `One` needs exactly one.

use geofilter_eval::{
    CompareOp, Expression, Filter, FilterFactory, MapRecord, MatchAction, Record, Value,
};
use serde_json::json;

// ──────────────────────────────────────────────
// Test helpers
// ──────────────────────────────────────────────

fn readings() -> Value {
    Value::from(vec![35.2f64, 202.3, 201.7, 10000.5])
}

fn prop(name: &str) -> Expression {
    Expression::property(name)
}

fn lit(v: impl Into<Value>) -> Expression {
    Expression::literal(v)
}

// ──────────────────────────────────────────────
// Literal lists
// ──────────────────────────────────────────────

#[test]
fn equal_finds_member() {
    let f = Filter::compare(CompareOp::Equal, lit(readings()), lit(201.7f64));
    assert!(f.evaluate(&()));
}

#[test]
fn between_is_existential() {
    assert!(Filter::between(lit(readings()), lit(34i32), lit(36i32)).evaluate(&()));
    assert!(!Filter::between(lit(readings()), lit(36i32), lit(201i32)).evaluate(&()));
}

#[test]
fn match_actions_on_comparisons() {
    let greater = |action| {
        Filter::compare(CompareOp::Greater, lit(readings()), lit(100i32))
            .with_match_action(action)
            .evaluate(&())
    };
    assert!(greater(MatchAction::Any));
    assert!(!greater(MatchAction::All));
    assert!(!greater(MatchAction::One));

    let huge = Filter::compare(CompareOp::Greater, lit(readings()), lit(1000i32))
        .with_match_action(MatchAction::One);
    assert!(huge.evaluate(&()));

    let positive = Filter::compare(CompareOp::Greater, lit(readings()), lit(0i32))
        .with_match_action(MatchAction::All);
    assert!(positive.evaluate(&()));
}

// ──────────────────────────────────────────────
// JSON-backed records
// ──────────────────────────────────────────────

fn road() -> serde_json::Value {
    json!({
        "id": "road.7",
        "name": "Harbour Way",
        "lanes": [2, 3, 4],
        "tags": ["coastal", "Scenic"],
        "surface": { "kind": "asphalt", "years": [1998, 2015] },
        "empty": []
    })
}

#[test]
fn json_arrays_are_multi_valued() {
    let record = road();
    let f = Filter::compare(CompareOp::Equal, prop("lanes"), lit(3i32));
    assert!(f.evaluate(&record));
    let f = Filter::compare(CompareOp::Equal, prop("lanes"), lit(5i32));
    assert!(!f.evaluate(&record));
}

#[test]
fn nested_paths_and_lists() {
    let record = road();
    assert_eq!(record.property("surface/kind"), Some(Value::from("asphalt")));
    let f = Filter::between(prop("surface/years"), lit(2010i32), lit(2020i32));
    assert!(f.evaluate(&record));
}

#[test]
fn like_over_lists_honours_case() {
    let ff = FilterFactory::with_defaults();
    let record = road();
    let sensitive = ff.like(prop("tags"), "scen*", "*", ".", "!").unwrap();
    assert!(!sensitive.evaluate(&record));
    let insensitive = ff
        .like_with_case(prop("tags"), "scen*", "*", ".", "!", false)
        .unwrap();
    assert!(insensitive.evaluate(&record));
}

#[test]
fn empty_list_never_matches() {
    let record = road();
    for action in [MatchAction::Any, MatchAction::All, MatchAction::One] {
        let f = Filter::compare(CompareOp::NotEqual, prop("empty"), lit(1i32))
            .with_match_action(action);
        assert!(!f.evaluate(&record), "{:?}", action);
    }
}

#[test]
fn both_sides_multi_valued() {
    let record = MapRecord::new()
        .with("a", vec![1i32, 2, 3])
        .with("b", vec![3i32, 4]);
    let f = Filter::compare(CompareOp::Equal, prop("a"), prop("b"));
    assert!(f.evaluate(&record));
    let f = f.with_match_action(MatchAction::One);
    assert!(f.evaluate(&record));
    let f = Filter::compare(CompareOp::Less, prop("a"), prop("b"))
        .with_match_action(MatchAction::All);
    assert!(!f.evaluate(&record));
}

// ──────────────────────────────────────────────
// Null guards
// ──────────────────────────────────────────────

#[test]
fn null_guard_inside_logic() {
    let record = MapRecord::new().with("name", "x");
    let guarded = Filter::and(vec![
        Filter::not(Filter::is_null(prop("speed"))),
        Filter::compare(CompareOp::Greater, prop("speed"), lit(50i32)),
    ]);
    assert!(!guarded.evaluate(&record));

    let either = Filter::or(vec![
        Filter::is_null(prop("speed")),
        Filter::compare(CompareOp::Greater, prop("speed"), lit(50i32)),
    ]);
    assert!(either.evaluate(&record));
}

#[test]
fn id_filter_uses_record_identity() {
    let record = road();
    assert!(Filter::id(["road.7", "road.8"]).evaluate(&record));
    assert!(!Filter::id(["road.9"]).evaluate(&record));
    assert!(!Filter::id(Vec::<String>::new()).evaluate(&record));
}
