//! Boolean filter trees.
//!
//! A filter is immutable once built and evaluating it has no side effects.
//! Equality is structural and order-sensitive; see
//! [`Filter::flattened_eq`] for the looser comparison that ignores how
//! AND/OR chains are nested.

use std::collections::BTreeSet;
use std::fmt;

use geo_types::{coord, Geometry, Rect};

use crate::config::LikeLimits;
use crate::error::{FilterError, Result};
use crate::expression::Expression;
use crate::like::LikePattern;
use crate::predicate;
use crate::record::Record;
use crate::spatial::{Distance, GeoOps, GeometryOps, SpatialOp};
use crate::types::{Crs, GeometryValue, Value};

/// Relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
        }
    }
}

/// How a filter treats multi-valued operands.
///
/// Every list operand is expanded and the operator is applied to each
/// combination of elements. An empty list leaves no combinations, which
/// fails under every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchAction {
    /// At least one combination satisfies the operator.
    #[default]
    Any,
    /// Every combination satisfies the operator.
    All,
    /// Exactly one combination satisfies the operator.
    One,
}

impl MatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            MatchAction::Any => "Any",
            MatchAction::All => "All",
            MatchAction::One => "One",
        }
    }

    pub fn parse(name: &str) -> Option<MatchAction> {
        match name.trim().to_ascii_lowercase().as_str() {
            "any" => Some(MatchAction::Any),
            "all" => Some(MatchAction::All),
            "one" => Some(MatchAction::One),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub left: Expression,
    pub right: Expression,
    pub match_case: bool,
    pub match_action: MatchAction,
}

/// Inclusive range test.
#[derive(Debug, Clone, PartialEq)]
pub struct Between {
    pub expr: Expression,
    pub lower: Expression,
    pub upper: Expression,
    pub match_action: MatchAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub expr: Expression,
    pub pattern: LikePattern,
    pub match_action: MatchAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spatial {
    pub op: SpatialOp,
    pub left: Expression,
    pub right: Expression,
    /// Present exactly when `op` is DWithin or Beyond.
    pub distance: Option<Distance>,
    pub match_action: MatchAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything.
    Include,
    /// Matches nothing.
    Exclude,
    Compare(Comparison),
    Between(Between),
    Like(Like),
    IsNull(Expression),
    Spatial(Spatial),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Matches records whose identity is in the set.
    Id(BTreeSet<String>),
}

impl Filter {
    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Filter {
        Filter::Compare(Comparison {
            op,
            left,
            right,
            match_case: true,
            match_action: MatchAction::Any,
        })
    }

    pub fn between(expr: Expression, lower: Expression, upper: Expression) -> Filter {
        Filter::Between(Between {
            expr,
            lower,
            upper,
            match_action: MatchAction::Any,
        })
    }

    pub fn like(expr: Expression, pattern: LikePattern) -> Filter {
        Filter::Like(Like {
            expr,
            pattern,
            match_action: MatchAction::Any,
        })
    }

    pub fn is_null(expr: Expression) -> Filter {
        Filter::IsNull(expr)
    }

    /// A topological predicate. Distance operators need
    /// [`Filter::distance`].
    pub fn spatial(op: SpatialOp, left: Expression, right: Expression) -> Result<Filter> {
        if op.is_distance() {
            return Err(FilterError::argument(format!(
                "{:?} requires a distance",
                op
            )));
        }
        Ok(Filter::Spatial(Spatial {
            op,
            left,
            right,
            distance: None,
            match_action: MatchAction::Any,
        }))
    }

    /// DWithin or Beyond.
    pub fn distance(
        op: SpatialOp,
        left: Expression,
        right: Expression,
        distance: Distance,
    ) -> Result<Filter> {
        if !op.is_distance() {
            return Err(FilterError::argument(format!(
                "{:?} does not take a distance",
                op
            )));
        }
        if !distance.value.is_finite() || distance.value < 0.0 {
            return Err(FilterError::argument(format!(
                "distance must be a non-negative number, got {}",
                distance.value
            )));
        }
        Ok(Filter::Spatial(Spatial {
            op,
            left,
            right,
            distance: Some(distance),
            match_action: MatchAction::Any,
        }))
    }

    /// Envelope intersection. A missing or blank `srs` leaves the
    /// reference system unspecified.
    pub fn bbox(
        expr: Expression,
        (min_x, min_y): (f64, f64),
        (max_x, max_y): (f64, f64),
        srs: Option<&str>,
    ) -> Filter {
        let rect = Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y });
        let envelope = GeometryValue::new(Geometry::Rect(rect)).with_crs(srs.and_then(Crs::new));
        Filter::Spatial(Spatial {
            op: SpatialOp::BBox,
            left: expr,
            right: Expression::Literal(Value::Geometry(envelope)),
            distance: None,
            match_action: MatchAction::Any,
        })
    }

    pub fn and(children: Vec<Filter>) -> Filter {
        Filter::And(children)
    }

    pub fn or(children: Vec<Filter>) -> Filter {
        Filter::Or(children)
    }

    pub fn not(child: Filter) -> Filter {
        Filter::Not(Box::new(child))
    }

    pub fn id<I, S>(ids: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Id(ids.into_iter().map(Into::into).collect())
    }

    /// Set case sensitivity on a comparison or Like filter. Other filters
    /// are returned unchanged.
    pub fn with_match_case(self, match_case: bool, limits: &LikeLimits) -> Result<Filter> {
        Ok(match self {
            Filter::Compare(mut c) => {
                c.match_case = match_case;
                Filter::Compare(c)
            }
            Filter::Like(mut l) if l.pattern.match_case() != match_case => {
                l.pattern = LikePattern::new(
                    l.pattern.pattern(),
                    l.pattern.wildcard_multi(),
                    l.pattern.wildcard_single(),
                    l.pattern.escape(),
                    match_case,
                    limits,
                )?;
                Filter::Like(l)
            }
            other => other,
        })
    }

    /// Set the multi-valued match action. Filters without one are
    /// returned unchanged.
    pub fn with_match_action(self, action: MatchAction) -> Filter {
        match self {
            Filter::Compare(mut c) => {
                c.match_action = action;
                Filter::Compare(c)
            }
            Filter::Between(mut b) => {
                b.match_action = action;
                Filter::Between(b)
            }
            Filter::Like(mut l) => {
                l.match_action = action;
                Filter::Like(l)
            }
            Filter::Spatial(mut s) => {
                s.match_action = action;
                Filter::Spatial(s)
            }
            other => other,
        }
    }

    pub fn match_action(&self) -> Option<MatchAction> {
        match self {
            Filter::Compare(c) => Some(c.match_action),
            Filter::Between(b) => Some(b.match_action),
            Filter::Like(l) => Some(l.match_action),
            Filter::Spatial(s) => Some(s.match_action),
            _ => None,
        }
    }

    /// Evaluate with the default geometry operations.
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        predicate::eval_filter(self, record, &GeoOps)
    }

    pub fn evaluate_with(&self, record: &dyn Record, ops: &dyn GeometryOps) -> bool {
        predicate::eval_filter(self, record, ops)
    }

    /// Equality that flattens nested AND/OR chains before comparing, so
    /// `AND(a, AND(b, c))` equals `AND(a, b, c)`. Child order still matters.
    pub fn flattened_eq(&self, other: &Filter) -> bool {
        match (self, other) {
            (Filter::And(_), Filter::And(_)) => {
                let (l, r) = (flattened_children(self, true), flattened_children(other, true));
                l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a.flattened_eq(b))
            }
            (Filter::Or(_), Filter::Or(_)) => {
                let (l, r) = (flattened_children(self, false), flattened_children(other, false));
                l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a.flattened_eq(b))
            }
            (Filter::Not(a), Filter::Not(b)) => a.flattened_eq(b),
            _ => self == other,
        }
    }
}

fn flattened_children(filter: &Filter, and: bool) -> Vec<&Filter> {
    let mut out = Vec::new();
    collect_flat(filter, and, &mut out);
    out
}

fn collect_flat<'a>(filter: &'a Filter, and: bool, out: &mut Vec<&'a Filter>) {
    match filter {
        Filter::And(children) if and => children.iter().for_each(|c| collect_flat(c, and, out)),
        Filter::Or(children) if !and => children.iter().for_each(|c| collect_flat(c, and, out)),
        other => out.push(other),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, children: &[Filter], word: &str| -> fmt::Result {
            f.write_str("[ ")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", word)?;
                }
                write!(f, "{}", child)?;
            }
            f.write_str(" ]")
        };
        match self {
            Filter::Include => f.write_str("INCLUDE"),
            Filter::Exclude => f.write_str("EXCLUDE"),
            Filter::Compare(c) => write!(f, "[ {} {} {} ]", c.left, c.op.symbol(), c.right),
            Filter::Between(b) => {
                write!(f, "[ {} BETWEEN {} AND {} ]", b.expr, b.lower, b.upper)
            }
            Filter::Like(l) => write!(f, "[ {} is like {} ]", l.expr, l.pattern.pattern()),
            Filter::IsNull(e) => write!(f, "[ {} IS NULL ]", e),
            Filter::Spatial(s) => match &s.distance {
                Some(d) => write!(
                    f,
                    "[ {} {:?} {}, distance: {} {} ]",
                    s.left,
                    s.op,
                    s.right,
                    d.value,
                    d.unit.symbol()
                ),
                None => write!(f, "[ {} {:?} {} ]", s.left, s.op, s.right),
            },
            Filter::And(children) => join(f, children, "AND"),
            Filter::Or(children) => join(f, children, "OR"),
            Filter::Not(child) => write!(f, "[ NOT {} ]", child),
            Filter::Id(ids) => {
                f.write_str("[ ")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(id)?;
                }
                f.write_str(" ]")
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
