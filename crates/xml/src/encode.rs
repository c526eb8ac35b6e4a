//! Filter document encoding.
//!
//! Output is deterministic: elements are written with the `ogc:` prefix
//! (`gml:` for geometries), the first element carries the namespace
//! declarations, and identity filters are written as bare sibling
//! `FeatureId` elements.

use geofilter_eval::{
    ArithmeticOp, CompareOp, Expression, Filter, GeometryValue, MatchAction, SpatialOp, Value,
};
use quick_xml::escape::escape;

use crate::gml::{GeometryXml, Gml2Reader};

pub const OGC_NAMESPACE: &str = "http://www.opengis.net/ogc";
pub const GML_NAMESPACE: &str = "http://www.opengis.net/gml";

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Append-only XML text writer.
#[derive(Debug, Clone)]
pub struct XmlWriter {
    out: String,
    declared: bool,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        XmlWriter {
            out: String::from(DECLARATION),
            declared: false,
        }
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open(name, attributes);
        self.out.push('>');
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open(name, attributes);
        self.out.push_str("/>");
    }

    pub fn end(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    pub fn text(&mut self, text: &str) {
        self.out.push_str(&escape(text));
    }

    /// Write `<name>text</name>`.
    pub fn text_element(&mut self, name: &str, text: &str) {
        self.start(name, &[]);
        self.text(text);
        self.end(name);
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.out.push('<');
        self.out.push_str(name);
        if !self.declared {
            self.declared = true;
            for (key, value) in [
                ("xmlns", OGC_NAMESPACE),
                ("xmlns:ogc", OGC_NAMESPACE),
                ("xmlns:gml", GML_NAMESPACE),
            ] {
                self.attribute(key, value);
            }
        }
        for (key, value) in attributes {
            self.attribute(key, value);
        }
    }

    fn attribute(&mut self, key: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(key);
        self.out.push_str("=\"");
        self.out.push_str(&escape(value));
        self.out.push('"');
    }
}

pub struct FilterEncoder {
    geometry: Box<dyn GeometryXml>,
}

impl Default for FilterEncoder {
    fn default() -> Self {
        FilterEncoder::new(Gml2Reader)
    }
}

impl FilterEncoder {
    pub fn new(geometry: impl GeometryXml + 'static) -> Self {
        FilterEncoder {
            geometry: Box::new(geometry),
        }
    }

    pub fn encode(&self, filter: &Filter) -> String {
        let mut out = XmlWriter::new();
        self.filter(filter, &mut out);
        out.finish()
    }

    fn filter(&self, filter: &Filter, out: &mut XmlWriter) {
        match filter {
            Filter::Include => out.empty("ogc:Include", &[]),
            Filter::Exclude => out.empty("ogc:Exclude", &[]),
            Filter::Compare(c) => {
                let name = compare_element(c.op);
                let mut attrs = Vec::new();
                if !c.match_case {
                    attrs.push(("matchCase", "false"));
                }
                push_match_action(&mut attrs, c.match_action);
                out.start(name, &attrs);
                self.expression(&c.left, out);
                self.expression(&c.right, out);
                out.end(name);
            }
            Filter::Between(b) => {
                let mut attrs = Vec::new();
                push_match_action(&mut attrs, b.match_action);
                out.start("ogc:PropertyIsBetween", &attrs);
                self.expression(&b.expr, out);
                out.start("ogc:LowerBoundary", &[]);
                self.expression(&b.lower, out);
                out.end("ogc:LowerBoundary");
                out.start("ogc:UpperBoundary", &[]);
                self.expression(&b.upper, out);
                out.end("ogc:UpperBoundary");
                out.end("ogc:PropertyIsBetween");
            }
            Filter::Like(l) => {
                let p = &l.pattern;
                let mut attrs = vec![
                    ("wildCard", p.wildcard_multi()),
                    ("singleChar", p.wildcard_single()),
                    ("escape", p.escape()),
                ];
                if !p.match_case() {
                    attrs.push(("matchCase", "false"));
                }
                push_match_action(&mut attrs, l.match_action);
                out.start("ogc:PropertyIsLike", &attrs);
                self.expression(&l.expr, out);
                out.text_element("ogc:Literal", p.pattern());
                out.end("ogc:PropertyIsLike");
            }
            Filter::IsNull(expr) => {
                out.start("ogc:PropertyIsNull", &[]);
                self.expression(expr, out);
                out.end("ogc:PropertyIsNull");
            }
            Filter::Spatial(s) => {
                let name = spatial_element(s.op);
                let mut attrs = Vec::new();
                push_match_action(&mut attrs, s.match_action);
                out.start(name, &attrs);
                self.spatial_operand(&s.left, out);
                self.spatial_operand(&s.right, out);
                if let Some(d) = &s.distance {
                    out.start("ogc:Distance", &[("units", d.unit.symbol())]);
                    out.text(&d.value.to_string());
                    out.end("ogc:Distance");
                }
                out.end(name);
            }
            Filter::And(children) => self.logic("ogc:And", children, out),
            Filter::Or(children) => self.logic("ogc:Or", children, out),
            Filter::Not(child) => {
                out.start("ogc:Not", &[]);
                self.filter(child, out);
                out.end("ogc:Not");
            }
            Filter::Id(ids) => {
                for id in ids {
                    out.empty("ogc:FeatureId", &[("fid", id)]);
                }
            }
        }
    }

    fn logic(&self, name: &str, children: &[Filter], out: &mut XmlWriter) {
        out.start(name, &[]);
        for child in children {
            self.filter(child, out);
        }
        out.end(name);
    }

    /// Geometry literals are written as bare GML inside spatial operators.
    fn spatial_operand(&self, expr: &Expression, out: &mut XmlWriter) {
        if let Expression::Literal(Value::Geometry(g)) = expr {
            if self.geometry.write(g, out) {
                return;
            }
        }
        self.expression(expr, out);
    }

    fn expression(&self, expr: &Expression, out: &mut XmlWriter) {
        match expr {
            Expression::Property(path) => out.text_element("ogc:PropertyName", path),
            Expression::Literal(value) => self.literal(value, out),
            Expression::Arithmetic(a) => {
                let name = arithmetic_element(a.op);
                out.start(name, &[]);
                self.expression(&a.left, out);
                self.expression(&a.right, out);
                out.end(name);
            }
            Expression::Function(call) => {
                out.start("ogc:Function", &[("name", call.name())]);
                for arg in call.args() {
                    self.expression(arg, out);
                }
                out.end("ogc:Function");
            }
        }
    }

    fn literal(&self, value: &Value, out: &mut XmlWriter) {
        match value {
            Value::Geometry(g) => {
                out.start("ogc:Literal", &[]);
                if !self.geometry.write(g, out) {
                    out.text(&wkt_text(g));
                }
                out.end("ogc:Literal");
            }
            Value::Null => out.empty("ogc:Literal", &[]),
            other => out.text_element("ogc:Literal", &other.to_string()),
        }
    }
}

/// Encode with the default GML writer.
pub fn encode_filter(filter: &Filter) -> String {
    FilterEncoder::default().encode(filter)
}

fn wkt_text(g: &GeometryValue) -> String {
    g.to_wkt_string()
}

fn push_match_action<'a>(attrs: &mut Vec<(&'a str, &'a str)>, action: MatchAction) {
    if action != MatchAction::Any {
        attrs.push(("matchAction", action.name()));
    }
}

fn compare_element(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Equal => "ogc:PropertyIsEqualTo",
        CompareOp::NotEqual => "ogc:PropertyIsNotEqualTo",
        CompareOp::Less => "ogc:PropertyIsLessThan",
        CompareOp::LessOrEqual => "ogc:PropertyIsLessThanOrEqualTo",
        CompareOp::Greater => "ogc:PropertyIsGreaterThan",
        CompareOp::GreaterOrEqual => "ogc:PropertyIsGreaterThanOrEqualTo",
    }
}

fn spatial_element(op: SpatialOp) -> &'static str {
    match op {
        SpatialOp::Equals => "ogc:Equals",
        SpatialOp::Disjoint => "ogc:Disjoint",
        SpatialOp::Intersects => "ogc:Intersects",
        SpatialOp::Within => "ogc:Within",
        SpatialOp::Contains => "ogc:Contains",
        SpatialOp::Overlaps => "ogc:Overlaps",
        SpatialOp::Touches => "ogc:Touches",
        SpatialOp::Crosses => "ogc:Crosses",
        SpatialOp::BBox => "ogc:BBOX",
        SpatialOp::DWithin => "ogc:DWithin",
        SpatialOp::Beyond => "ogc:Beyond",
    }
}

fn arithmetic_element(op: ArithmeticOp) -> &'static str {
    match op {
        ArithmeticOp::Add => "ogc:Add",
        ArithmeticOp::Subtract => "ogc:Sub",
        ArithmeticOp::Multiply => "ogc:Mul",
        ArithmeticOp::Divide => "ogc:Div",
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
