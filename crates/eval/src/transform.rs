//! Derived tree algorithms: attribute extraction, pruning and
//! inverse envelope propagation through geometry transforms.

use std::collections::BTreeSet;

use geo_types::Rect;

use crate::expression::Expression;
use crate::filter::Filter;
use crate::visitor::Visitor;

#[derive(Default)]
struct AttributeCollector {
    names: BTreeSet<String>,
}

impl Visitor for AttributeCollector {
    fn visit_property(&mut self, path: &str) {
        self.names.insert(path.to_string());
    }
}

/// Every distinct property name referenced anywhere in the filter.
pub fn attribute_names(filter: &Filter) -> BTreeSet<String> {
    let mut collector = AttributeCollector::default();
    filter.accept(&mut collector);
    collector.names
}

pub fn expression_attribute_names(expr: &Expression) -> BTreeSet<String> {
    let mut collector = AttributeCollector::default();
    expr.accept(&mut collector);
    collector.names
}

/// Remove the first occurrence of `target` from `base`.
///
/// When `base` itself equals `target` the result is `Include`. Otherwise
/// only children of AND/OR nodes are candidates: a combinator left with one
/// child collapses to that child, an AND left empty becomes `Include` and an
/// OR left empty becomes `Exclude`. With `recurse` false only the direct
/// children of a top-level AND/OR are inspected.
pub fn remove_filter(base: &Filter, target: &Filter, recurse: bool) -> Filter {
    if base == target {
        return Filter::Include;
    }
    let mut removed = false;
    prune(base, target, recurse, &mut removed)
}

fn prune(filter: &Filter, target: &Filter, recurse: bool, removed: &mut bool) -> Filter {
    match filter {
        Filter::And(children) => {
            let kept = prune_children(children, target, recurse, removed);
            collapse(kept, children.len(), Filter::And, Filter::Include)
        }
        Filter::Or(children) => {
            let kept = prune_children(children, target, recurse, removed);
            collapse(kept, children.len(), Filter::Or, Filter::Exclude)
        }
        Filter::Not(child) if recurse && !*removed => {
            Filter::not(prune(child, target, recurse, removed))
        }
        other => other.clone(),
    }
}

fn prune_children(
    children: &[Filter],
    target: &Filter,
    recurse: bool,
    removed: &mut bool,
) -> Vec<Filter> {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        if *removed {
            kept.push(child.clone());
        } else if child == target {
            *removed = true;
        } else if recurse {
            kept.push(prune(child, target, recurse, removed));
        } else {
            kept.push(child.clone());
        }
    }
    kept
}

/// Rebuild a combinator. Only a node that lost a child is collapsed.
fn collapse(
    mut kept: Vec<Filter>,
    before: usize,
    rebuild: fn(Vec<Filter>) -> Filter,
    empty: Filter,
) -> Filter {
    if kept.len() == before {
        return rebuild(kept);
    }
    match kept.len() {
        0 => empty,
        1 => kept.remove(0),
        _ => rebuild(kept),
    }
}

/// The extent that must be read upstream so that, once `expr`'s chain of
/// geometry transforms is applied, `target` is still fully covered.
///
/// The chain is followed outermost first through each call's first
/// argument. A property or literal ends the chain. `None` when any call in
/// the chain has no inverse.
pub fn invert_envelope(expr: &Expression, target: Rect<f64>) -> Option<Rect<f64>> {
    let mut current = expr;
    let mut extent = target;
    while let Expression::Function(call) = current {
        extent = call.implementation().invert_envelope(call.args(), extent)?;
        match call.args().first() {
            Some(inner) => current = inner,
            None => break,
        }
    }
    Some(extent)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
