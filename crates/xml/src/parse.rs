//! Filter document parsing.
//!
//! The document is read into an element tree first (see [`crate::dom`]),
//! then a recursive descent turns recognized elements into filters and
//! expressions. Elements outside the vocabulary are skipped so a filter
//! can be pulled out of a larger document.

use std::collections::BTreeSet;

use geofilter_eval::{
    ArithmeticOp, CompareOp, Distance, DistanceUnit, Expression, Filter, FilterError,
    FilterFactory, MatchAction, SpatialOp, Value,
};
use tracing::trace;

use crate::dom::{read_document_bounded, XmlElement};
use crate::error::{CodecError, Result};
use crate::gml::{GeometryXml, Gml2Reader};

pub struct FilterParser {
    factory: FilterFactory,
    geometry: Box<dyn GeometryXml>,
}

impl Default for FilterParser {
    fn default() -> Self {
        FilterParser::new(FilterFactory::with_defaults())
    }
}

impl FilterParser {
    pub fn new(factory: FilterFactory) -> Self {
        FilterParser {
            factory,
            geometry: Box::new(Gml2Reader),
        }
    }

    pub fn with_geometry(mut self, geometry: impl GeometryXml + 'static) -> Self {
        self.geometry = Box::new(geometry);
        self
    }

    /// Parse a filter document.
    ///
    /// Sibling feature id elements, with or without a `Filter` wrapper,
    /// combine into a single identity filter. Otherwise the first filter
    /// element found, searching wrappers depth first, is returned.
    /// Documents nested deeper than the configured `max_nesting_depth` are
    /// rejected as malformed.
    pub fn parse(&self, content: &str) -> Result<Filter> {
        let roots = read_document_bounded(content, self.factory.config().max_nesting_depth)?;
        self.top_level(&roots)?.ok_or(CodecError::NoFilter)
    }

    fn top_level(&self, elements: &[XmlElement]) -> Result<Option<Filter>> {
        if let Some(ids) = self.identity(elements) {
            return Ok(Some(ids));
        }
        for element in elements {
            if element.name != "Filter" {
                if let Some(filter) = self.filter(element)? {
                    return Ok(Some(filter));
                }
            }
            // Wrappers and foreign elements may still hold a filter.
            if let Some(filter) = self.top_level(&element.children)? {
                return Ok(Some(filter));
            }
        }
        Ok(None)
    }

    /// An identity filter when the elements hold feature ids and nothing
    /// else the parser understands.
    fn identity(&self, elements: &[XmlElement]) -> Option<Filter> {
        let mut ids = BTreeSet::new();
        for element in elements {
            match id_of(element) {
                Some(id) => {
                    ids.insert(id.to_string());
                }
                None if is_filter_element(&element.name) || element.name == "Filter" => {
                    return None;
                }
                None => {}
            }
        }
        if ids.is_empty() {
            None
        } else {
            Some(Filter::Id(ids))
        }
    }

    // ── Filters ──

    fn filter(&self, element: &XmlElement) -> Result<Option<Filter>> {
        let name = element.name.as_str();
        let filter = match name {
            "And" => self.factory.and(self.filter_children(element)?),
            "Or" => self.factory.or(self.filter_children(element)?),
            "Not" => {
                let mut children = self.filter_children(element)?;
                if children.len() != 1 {
                    return Err(CodecError::malformed(
                        name,
                        format!("expects one filter, found {}", children.len()),
                    ));
                }
                self.factory.not(children.remove(0))
            }
            "Include" => Filter::Include,
            "Exclude" => Filter::Exclude,
            "FeatureId" | "GmlObjectId" => match self.identity(std::slice::from_ref(element)) {
                Some(ids) => ids,
                None => return Err(CodecError::malformed(name, "missing id attribute")),
            },
            "PropertyIsNull" => {
                let [expr] = self.expressions::<1>(element)?;
                self.factory.is_null(expr)
            }
            "PropertyIsBetween" => self.between(element)?,
            "PropertyIsLike" => self.like(element)?,
            "BBOX" => self.bbox(element)?,
            "DWithin" | "Beyond" => self.distance(element)?,
            _ => {
                if let Some(op) = compare_op(name) {
                    let [left, right] = self.expressions::<2>(element)?;
                    let match_case = match element.attribute("matchCase") {
                        Some(v) => parse_flag(name, v)?,
                        None => self.factory.config().default_match_case,
                    };
                    self.factory.compare_with_case(op, left, right, match_case)
                } else if let Some(op) = topological_op(name) {
                    let [left, right] = self.spatial_operands::<2>(element)?;
                    self.factory.spatial(op, left, right)?
                } else {
                    trace!(element = name, "skipping unknown element");
                    return Ok(None);
                }
            }
        };
        let filter = match element.attribute("matchAction") {
            Some(action) => {
                let action = MatchAction::parse(action).ok_or_else(|| {
                    CodecError::malformed(name, format!("unknown matchAction '{}'", action))
                })?;
                filter.with_match_action(action)
            }
            None => filter,
        };
        Ok(Some(filter))
    }

    fn filter_children(&self, element: &XmlElement) -> Result<Vec<Filter>> {
        let mut filters = Vec::new();
        let mut ids = Vec::new();
        for child in &element.children {
            if id_of(child).is_some() {
                ids.push(child.clone());
            } else if let Some(f) = self.filter(child)? {
                filters.push(f);
            }
        }
        if let Some(id) = self.identity(&ids) {
            filters.push(id);
        }
        Ok(filters)
    }

    fn between(&self, element: &XmlElement) -> Result<Filter> {
        let name = &element.name;
        let expr = self
            .first_expression(element)?
            .ok_or_else(|| CodecError::malformed(name, "missing expression"))?;
        let bound = |boundary: &str| -> Result<Expression> {
            let b = element
                .child(boundary)
                .ok_or_else(|| CodecError::malformed(name, format!("missing {}", boundary)))?;
            self.first_expression(b)?
                .ok_or_else(|| CodecError::malformed(boundary, "missing expression"))
        };
        let lower = bound("LowerBoundary")?;
        let upper = bound("UpperBoundary")?;
        Ok(self.factory.between(expr, lower, upper))
    }

    fn like(&self, element: &XmlElement) -> Result<Filter> {
        let name = &element.name;
        let mut exprs = self.expression_children(element)?;
        if exprs.len() != 2 {
            return Err(CodecError::malformed(
                name,
                "expects an expression and a pattern literal",
            ));
        }
        let pattern = match exprs.remove(1) {
            Expression::Literal(Value::Text(p)) => p,
            Expression::Literal(v) => v.to_string(),
            _ => return Err(CodecError::malformed(name, "pattern must be a literal")),
        };
        let expr = exprs.remove(0);
        let wildcard = element.attribute("wildCard").unwrap_or("*");
        let single = element.attribute("singleChar").unwrap_or(".");
        let escape = element
            .attribute("escape")
            .or_else(|| element.attribute("escapeChar"))
            .unwrap_or("!");
        let match_case = match element.attribute("matchCase") {
            Some(v) => parse_flag(name, v)?,
            None => self.factory.config().default_match_case,
        };
        Ok(self
            .factory
            .like_with_case(expr, &pattern, wildcard, single, escape, match_case)?)
    }

    fn bbox(&self, element: &XmlElement) -> Result<Filter> {
        let mut property = None;
        let mut envelope = None;
        for child in &element.children {
            if let Some(g) = self.geometry.read(child)? {
                envelope = Some(g);
            } else if let Some(e) = self.expression(child)? {
                property = Some(e);
            }
        }
        let envelope =
            envelope.ok_or_else(|| CodecError::malformed("BBOX", "missing envelope"))?;
        let property =
            property.ok_or_else(|| CodecError::malformed("BBOX", "missing property name"))?;
        Ok(self
            .factory
            .spatial(SpatialOp::BBox, property, Expression::literal(Value::Geometry(envelope)))?)
    }

    fn distance(&self, element: &XmlElement) -> Result<Filter> {
        let name = element.name.as_str();
        let [left, right] = self.spatial_operands::<2>(element)?;
        let distance = element
            .child("Distance")
            .ok_or_else(|| CodecError::malformed(name, "missing Distance"))?;
        let value = distance
            .trimmed_text()
            .parse::<f64>()
            .map_err(|_| CodecError::InvalidNumber {
                element: "Distance".to_string(),
                text: distance.text.clone(),
            })?;
        let units = distance.attribute("units").unwrap_or("");
        let unit: DistanceUnit = self.factory.unit(units)?;
        let op = if name == "DWithin" {
            SpatialOp::DWithin
        } else {
            SpatialOp::Beyond
        };
        Ok(Filter::distance(op, left, right, Distance::new(value, unit))?)
    }

    // ── Expressions ──

    fn expression(&self, element: &XmlElement) -> Result<Option<Expression>> {
        let name = element.name.as_str();
        let expr = match name {
            "PropertyName" | "ValueReference" => {
                self.factory.property(element.trimmed_text())
            }
            "Literal" => self.literal(element)?,
            "Add" | "Sub" | "Mul" | "Div" => {
                let op = match name {
                    "Add" => ArithmeticOp::Add,
                    "Sub" => ArithmeticOp::Subtract,
                    "Mul" => ArithmeticOp::Multiply,
                    _ => ArithmeticOp::Divide,
                };
                let mut builder = self.factory.arithmetic(op);
                for operand in self.expression_children(element)? {
                    builder.push(operand)?;
                }
                builder.build()?
            }
            "Function" => {
                let function = element
                    .attribute("name")
                    .ok_or_else(|| CodecError::malformed(name, "missing name attribute"))?;
                let args = self.expression_children(element)?;
                self.factory.function(function, args)?
            }
            _ => return Ok(None),
        };
        Ok(Some(expr))
    }

    fn literal(&self, element: &XmlElement) -> Result<Expression> {
        for child in &element.children {
            if child.name == "Literal" {
                return Err(FilterError::construction("a literal cannot wrap another literal").into());
            }
            if let Some(g) = self.geometry.read(child)? {
                return Ok(Expression::literal(Value::Geometry(g)));
            }
        }
        Ok(Expression::literal(element.trimmed_text()))
    }

    fn expression_children(&self, element: &XmlElement) -> Result<Vec<Expression>> {
        let mut exprs = Vec::new();
        for child in &element.children {
            if let Some(e) = self.expression(child)? {
                exprs.push(e);
            }
        }
        Ok(exprs)
    }

    fn first_expression(&self, element: &XmlElement) -> Result<Option<Expression>> {
        for child in &element.children {
            if let Some(e) = self.expression(child)? {
                return Ok(Some(e));
            }
        }
        Ok(None)
    }

    fn expressions<const N: usize>(&self, element: &XmlElement) -> Result<[Expression; N]> {
        let exprs = self.expression_children(element)?;
        let found = exprs.len();
        exprs.try_into().map_err(|_| {
            CodecError::malformed(&element.name, format!("expects {} expressions, found {}", N, found))
        })
    }

    /// Operands of a spatial operator: expressions or bare geometries.
    fn spatial_operands<const N: usize>(&self, element: &XmlElement) -> Result<[Expression; N]> {
        let mut operands = Vec::new();
        for child in &element.children {
            if let Some(g) = self.geometry.read(child)? {
                operands.push(Expression::literal(Value::Geometry(g)));
            } else if let Some(e) = self.expression(child)? {
                operands.push(e);
            }
        }
        let found = operands.len();
        operands.try_into().map_err(|_| {
            CodecError::malformed(&element.name, format!("expects {} operands, found {}", N, found))
        })
    }
}

/// Parse with the built-in function table and default configuration.
pub fn parse_filter(content: &str) -> Result<Filter> {
    FilterParser::default().parse(content)
}

// ── Vocabulary ──────────────────────────────────────────────────────

fn id_of(element: &XmlElement) -> Option<&str> {
    match element.name.as_str() {
        "FeatureId" => element.attribute("fid"),
        "GmlObjectId" | "ResourceId" => element
            .attribute("id")
            .or_else(|| element.attribute("rid")),
        _ => None,
    }
}

fn compare_op(name: &str) -> Option<CompareOp> {
    Some(match name {
        "PropertyIsEqualTo" => CompareOp::Equal,
        "PropertyIsNotEqualTo" => CompareOp::NotEqual,
        "PropertyIsLessThan" => CompareOp::Less,
        "PropertyIsLessThanOrEqualTo" => CompareOp::LessOrEqual,
        "PropertyIsGreaterThan" => CompareOp::Greater,
        "PropertyIsGreaterThanOrEqualTo" => CompareOp::GreaterOrEqual,
        _ => return None,
    })
}

fn topological_op(name: &str) -> Option<SpatialOp> {
    Some(match name {
        "Equals" => SpatialOp::Equals,
        "Disjoint" => SpatialOp::Disjoint,
        "Intersects" => SpatialOp::Intersects,
        "Within" => SpatialOp::Within,
        "Contains" => SpatialOp::Contains,
        "Overlaps" => SpatialOp::Overlaps,
        "Touches" => SpatialOp::Touches,
        "Crosses" => SpatialOp::Crosses,
        _ => return None,
    })
}

fn is_filter_element(name: &str) -> bool {
    compare_op(name).is_some()
        || topological_op(name).is_some()
        || matches!(
            name,
            "And"
                | "Or"
                | "Not"
                | "Include"
                | "Exclude"
                | "PropertyIsNull"
                | "PropertyIsBetween"
                | "PropertyIsLike"
                | "BBOX"
                | "DWithin"
                | "Beyond"
        )
}

fn parse_flag(element: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(CodecError::malformed(
            element,
            format!("expected true or false, found '{}'", other),
        )),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
