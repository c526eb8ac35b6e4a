//! Capability negotiation with a backend store.
//!
//! A [`Capabilities`] set declares which operators and functions a backend
//! evaluates natively. Backends use [`Capabilities::fully_supports`] and
//! [`split_filter`] to decide what runs server-side and what must be
//! evaluated here afterwards.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::expression::{Arithmetic, ArithmeticOp, Expression};
use crate::filter::{CompareOp, Filter};
use crate::function::FunctionCall;
use crate::spatial::SpatialOp;
use crate::visitor::{walk_arithmetic, walk_filter, walk_function, Visitor};

/// Every operator a capability set can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorTag {
    Compare(CompareOp),
    Between,
    Like,
    IsNull,
    Id,
    And,
    Or,
    Not,
    Include,
    Exclude,
    Spatial(SpatialOp),
    Arithmetic(ArithmeticOp),
}

impl Filter {
    /// The tag of this node's own operator, ignoring its children.
    pub fn operator_tag(&self) -> OperatorTag {
        match self {
            Filter::Include => OperatorTag::Include,
            Filter::Exclude => OperatorTag::Exclude,
            Filter::Compare(c) => OperatorTag::Compare(c.op),
            Filter::Between(_) => OperatorTag::Between,
            Filter::Like(_) => OperatorTag::Like,
            Filter::IsNull(_) => OperatorTag::IsNull,
            Filter::Spatial(s) => OperatorTag::Spatial(s.op),
            Filter::And(_) => OperatorTag::And,
            Filter::Or(_) => OperatorTag::Or,
            Filter::Not(_) => OperatorTag::Not,
            Filter::Id(_) => OperatorTag::Id,
        }
    }
}

/// Accepted argument counts for a declared function.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arity {
    Any,
    Counts(BTreeSet<usize>),
}

/// A growable set of supported operators and functions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    operators: BTreeSet<OperatorTag>,
    /// Keyed by lower-cased name.
    functions: BTreeMap<String, Arity>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// The six relational comparisons plus Between, Like and IsNull.
    pub fn simple_comparisons() -> Self {
        let mut caps = Self::new();
        for op in [
            CompareOp::Equal,
            CompareOp::NotEqual,
            CompareOp::Less,
            CompareOp::LessOrEqual,
            CompareOp::Greater,
            CompareOp::GreaterOrEqual,
        ] {
            caps.add_type(OperatorTag::Compare(op));
        }
        caps.add_type(OperatorTag::Between);
        caps.add_type(OperatorTag::Like);
        caps.add_type(OperatorTag::IsNull);
        caps
    }

    /// And, Or, Not, and the Include/Exclude identities.
    pub fn logical() -> Self {
        let mut caps = Self::new();
        for tag in [
            OperatorTag::And,
            OperatorTag::Or,
            OperatorTag::Not,
            OperatorTag::Include,
            OperatorTag::Exclude,
        ] {
            caps.add_type(tag);
        }
        caps
    }

    pub fn simple_arithmetic() -> Self {
        let mut caps = Self::new();
        for op in [
            ArithmeticOp::Add,
            ArithmeticOp::Subtract,
            ArithmeticOp::Multiply,
            ArithmeticOp::Divide,
        ] {
            caps.add_type(OperatorTag::Arithmetic(op));
        }
        caps
    }

    /// Every spatial operator including BBOX and the distance tests.
    pub fn spatial() -> Self {
        let mut caps = Self::new();
        for op in [
            SpatialOp::Equals,
            SpatialOp::Disjoint,
            SpatialOp::Intersects,
            SpatialOp::Within,
            SpatialOp::Contains,
            SpatialOp::Overlaps,
            SpatialOp::Touches,
            SpatialOp::Crosses,
            SpatialOp::BBox,
            SpatialOp::DWithin,
            SpatialOp::Beyond,
        ] {
            caps.add_type(OperatorTag::Spatial(op));
        }
        caps
    }

    pub fn add_type(&mut self, tag: OperatorTag) -> &mut Self {
        self.operators.insert(tag);
        self
    }

    /// Declare a function. `None` accepts any argument count; repeated
    /// calls with counts accumulate.
    pub fn add_name(&mut self, name: &str, arg_count: Option<usize>) -> &mut Self {
        let key = name.to_lowercase();
        match arg_count {
            None => {
                self.functions.insert(key, Arity::Any);
            }
            Some(count) => match self.functions.entry(key).or_insert_with(|| Arity::Counts(BTreeSet::new())) {
                Arity::Any => {}
                Arity::Counts(counts) => {
                    counts.insert(count);
                }
            },
        }
        self
    }

    /// Union with another capability set.
    pub fn add_all(&mut self, other: &Capabilities) -> &mut Self {
        self.operators.extend(other.operators.iter().copied());
        for (name, arity) in &other.functions {
            match arity {
                Arity::Any => {
                    self.add_name(name, None);
                }
                Arity::Counts(counts) => {
                    for count in counts {
                        self.add_name(name, Some(*count));
                    }
                }
            }
        }
        self
    }

    pub fn supports_type(&self, tag: OperatorTag) -> bool {
        self.operators.contains(&tag)
    }

    pub fn supports_function(&self, name: &str, arg_count: usize) -> bool {
        match self.functions.get(&name.to_lowercase()) {
            Some(Arity::Any) => true,
            Some(Arity::Counts(counts)) => counts.contains(&arg_count),
            None => false,
        }
    }

    /// Whether the filter's own operator is supported. Children are not
    /// inspected.
    pub fn supports(&self, filter: &Filter) -> bool {
        self.supports_type(filter.operator_tag())
    }

    /// Whether every operator and function anywhere in the tree is
    /// supported.
    pub fn fully_supports(&self, filter: &Filter) -> bool {
        let mut checker = SupportChecker {
            caps: self,
            supported: true,
        };
        filter.accept(&mut checker);
        checker.supported
    }

    pub fn fully_supports_expression(&self, expr: &Expression) -> bool {
        let mut checker = SupportChecker {
            caps: self,
            supported: true,
        };
        expr.accept(&mut checker);
        checker.supported
    }
}

struct SupportChecker<'a> {
    caps: &'a Capabilities,
    supported: bool,
}

impl Visitor for SupportChecker<'_> {
    fn visit_filter(&mut self, filter: &Filter) {
        if !self.supported {
            return;
        }
        if !self.caps.supports(filter) {
            self.supported = false;
            return;
        }
        walk_filter(self, filter);
    }

    fn visit_arithmetic(&mut self, expr: &Arithmetic) {
        if !self.caps.supports_type(OperatorTag::Arithmetic(expr.op)) {
            self.supported = false;
            return;
        }
        walk_arithmetic(self, expr);
    }

    fn visit_function(&mut self, call: &FunctionCall) {
        if !self.caps.supports_function(call.name(), call.args().len()) {
            self.supported = false;
            return;
        }
        walk_function(self, call);
    }
}

/// A filter split between a backend and local evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFilter {
    /// Run by the backend.
    pub pre: Filter,
    /// Run locally on what the backend returns.
    pub post: Filter,
}

/// Split a filter into a backend part and a local remainder.
///
/// Children of a top-level AND are partitioned individually. Any other
/// filter goes to the backend whole when it is fully supported and stays
/// local otherwise.
pub fn split_filter(filter: &Filter, caps: &Capabilities) -> SplitFilter {
    let split = match filter {
        Filter::And(children) if caps.supports_type(OperatorTag::And) => {
            let (pre, post): (Vec<Filter>, Vec<Filter>) = children
                .iter()
                .cloned()
                .partition(|child| caps.fully_supports(child));
            SplitFilter {
                pre: conjunction(pre),
                post: conjunction(post),
            }
        }
        other if caps.fully_supports(other) => SplitFilter {
            pre: other.clone(),
            post: Filter::Include,
        },
        other => SplitFilter {
            pre: Filter::Include,
            post: other.clone(),
        },
    };
    debug!(pre = %split.pre, post = %split.post, "split filter");
    split
}

fn conjunction(mut children: Vec<Filter>) -> Filter {
    match children.len() {
        0 => Filter::Include,
        1 => children.remove(0),
        _ => Filter::And(children),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
