//! Tree traversal.
//!
//! [`Visitor`] has one method per concrete filter and expression variant.
//! Every method defaults to walking the node's children, so an
//! implementation overrides only the variants it cares about and calls the
//! matching `walk_*` function when it still wants to descend.

use std::collections::BTreeSet;

use crate::expression::{Arithmetic, Expression};
use crate::filter::{Between, Comparison, Filter, Like, Spatial};
use crate::function::FunctionCall;
use crate::types::Value;

pub trait Visitor {
    fn visit_filter(&mut self, filter: &Filter) {
        walk_filter(self, filter);
    }

    fn visit_include(&mut self) {}

    fn visit_exclude(&mut self) {}

    fn visit_compare(&mut self, compare: &Comparison) {
        walk_compare(self, compare);
    }

    fn visit_between(&mut self, between: &Between) {
        walk_between(self, between);
    }

    fn visit_like(&mut self, like: &Like) {
        self.visit_expression(&like.expr);
    }

    fn visit_is_null(&mut self, expr: &Expression) {
        self.visit_expression(expr);
    }

    fn visit_spatial(&mut self, spatial: &Spatial) {
        walk_spatial(self, spatial);
    }

    fn visit_and(&mut self, children: &[Filter]) {
        walk_children(self, children);
    }

    fn visit_or(&mut self, children: &[Filter]) {
        walk_children(self, children);
    }

    fn visit_not(&mut self, child: &Filter) {
        self.visit_filter(child);
    }

    fn visit_id(&mut self, _ids: &BTreeSet<String>) {}

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }

    fn visit_literal(&mut self, _value: &Value) {}

    fn visit_property(&mut self, _path: &str) {}

    fn visit_arithmetic(&mut self, arithmetic: &Arithmetic) {
        walk_arithmetic(self, arithmetic);
    }

    fn visit_function(&mut self, call: &FunctionCall) {
        walk_function(self, call);
    }
}

/// Dispatch a filter node to its variant method.
pub fn walk_filter<V: Visitor + ?Sized>(visitor: &mut V, filter: &Filter) {
    match filter {
        Filter::Include => visitor.visit_include(),
        Filter::Exclude => visitor.visit_exclude(),
        Filter::Compare(c) => visitor.visit_compare(c),
        Filter::Between(b) => visitor.visit_between(b),
        Filter::Like(l) => visitor.visit_like(l),
        Filter::IsNull(e) => visitor.visit_is_null(e),
        Filter::Spatial(s) => visitor.visit_spatial(s),
        Filter::And(children) => visitor.visit_and(children),
        Filter::Or(children) => visitor.visit_or(children),
        Filter::Not(child) => visitor.visit_not(child),
        Filter::Id(ids) => visitor.visit_id(ids),
    }
}

pub fn walk_children<V: Visitor + ?Sized>(visitor: &mut V, children: &[Filter]) {
    for child in children {
        visitor.visit_filter(child);
    }
}

pub fn walk_compare<V: Visitor + ?Sized>(visitor: &mut V, compare: &Comparison) {
    visitor.visit_expression(&compare.left);
    visitor.visit_expression(&compare.right);
}

pub fn walk_between<V: Visitor + ?Sized>(visitor: &mut V, between: &Between) {
    visitor.visit_expression(&between.expr);
    visitor.visit_expression(&between.lower);
    visitor.visit_expression(&between.upper);
}

pub fn walk_spatial<V: Visitor + ?Sized>(visitor: &mut V, spatial: &Spatial) {
    visitor.visit_expression(&spatial.left);
    visitor.visit_expression(&spatial.right);
}

/// Dispatch an expression node to its variant method.
pub fn walk_expression<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expression) {
    match expr {
        Expression::Literal(v) => visitor.visit_literal(v),
        Expression::Property(p) => visitor.visit_property(p),
        Expression::Arithmetic(a) => visitor.visit_arithmetic(a),
        Expression::Function(f) => visitor.visit_function(f),
    }
}

pub fn walk_arithmetic<V: Visitor + ?Sized>(visitor: &mut V, arithmetic: &Arithmetic) {
    visitor.visit_expression(&arithmetic.left);
    visitor.visit_expression(&arithmetic.right);
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, call: &FunctionCall) {
    for arg in call.args() {
        visitor.visit_expression(arg);
    }
}

impl Filter {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_filter(self);
    }
}

impl Expression {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_expression(self);
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ArithmeticOp;
    use crate::filter::CompareOp;
    use crate::function::FunctionRegistry;

    #[derive(Default)]
    struct Counter {
        filters: usize,
        literals: usize,
        properties: Vec<String>,
        functions: Vec<String>,
    }

    impl Visitor for Counter {
        fn visit_filter(&mut self, filter: &Filter) {
            self.filters += 1;
            walk_filter(self, filter);
        }

        fn visit_literal(&mut self, _value: &Value) {
            self.literals += 1;
        }

        fn visit_property(&mut self, path: &str) {
            self.properties.push(path.to_string());
        }

        fn visit_function(&mut self, call: &FunctionCall) {
            self.functions.push(call.name().to_string());
            walk_function(self, call);
        }
    }

    #[test]
    fn reaches_every_node() {
        let registry = FunctionRegistry::with_builtins();
        let upper = registry
            .call("strToUpperCase", vec![Expression::property("name")])
            .unwrap();
        let tree = Filter::and(vec![
            Filter::compare(CompareOp::Equal, Expression::Function(upper), Expression::literal("A")),
            Filter::not(Filter::between(
                Expression::arithmetic(
                    ArithmeticOp::Multiply,
                    Expression::property("w"),
                    Expression::property("h"),
                ),
                Expression::literal(1i32),
                Expression::literal(10i32),
            )),
            Filter::Include,
        ]);

        let mut counter = Counter::default();
        tree.accept(&mut counter);
        assert_eq!(counter.filters, 5);
        assert_eq!(counter.literals, 3);
        assert_eq!(counter.properties, vec!["name", "w", "h"]);
        assert_eq!(counter.functions, vec!["strToUpperCase"]);
    }

    #[test]
    fn overriding_without_walk_stops_descent() {
        struct Shallow(usize);
        impl Visitor for Shallow {
            fn visit_not(&mut self, _child: &Filter) {}
            fn visit_property(&mut self, _path: &str) {
                self.0 += 1;
            }
        }

        let tree = Filter::or(vec![
            Filter::is_null(Expression::property("a")),
            Filter::not(Filter::is_null(Expression::property("b"))),
        ]);
        let mut v = Shallow(0);
        tree.accept(&mut v);
        assert_eq!(v.0, 1);
    }
}
