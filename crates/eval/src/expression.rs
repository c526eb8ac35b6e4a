//! Value-producing expression trees.
//!
//! An expression is immutable once built. Evaluating it reads the record
//! through [`Record`] and never mutates anything, so one tree can be
//! shared across threads and evaluated against many records at once.

use std::fmt;

use crate::error::{FilterError, Result};
use crate::function::FunctionCall;
use crate::numeric;
use crate::record::Record;
use crate::types::{Value, ValueKind};

/// The four arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// A binary arithmetic node. Both operands are always present; use
/// [`ArithmeticBuilder`] to assemble one piecewise.
#[derive(Debug, Clone, PartialEq)]
pub struct Arithmetic {
    pub op: ArithmeticOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// A property reference, resolved through [`Record::property`].
    Property(String),
    Arithmetic(Arithmetic),
    Function(FunctionCall),
}

/// What a literal is being built from.
#[derive(Debug, Clone)]
pub enum LiteralContent {
    Value(Value),
    Expression(Expression),
}

impl From<Value> for LiteralContent {
    fn from(v: Value) -> Self {
        LiteralContent::Value(v)
    }
}

impl From<Expression> for LiteralContent {
    fn from(e: Expression) -> Self {
        LiteralContent::Expression(e)
    }
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Expression {
        Expression::Literal(value.into())
    }

    pub fn property(path: impl Into<String>) -> Expression {
        Expression::Property(path.into())
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Expression {
        Expression::Arithmetic(Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Build a literal from a value or from a constant expression.
    ///
    /// Constant expressions are folded into their value. A literal cannot
    /// wrap another literal, and content that reads record properties is
    /// not constant; both are construction errors.
    pub fn wrap_literal(content: impl Into<LiteralContent>) -> Result<Expression> {
        match content.into() {
            LiteralContent::Value(v) => Ok(Expression::Literal(v)),
            LiteralContent::Expression(Expression::Literal(_)) => Err(FilterError::construction(
                "a literal cannot wrap another literal",
            )),
            LiteralContent::Expression(expr) => {
                if expr.references_properties() {
                    return Err(FilterError::construction(format!(
                        "literal content '{}' reads record properties",
                        expr
                    )));
                }
                Ok(Expression::Literal(expr.evaluate(&())))
            }
        }
    }

    /// Evaluate against a record. Missing properties and failed
    /// coercions produce [`Value::Null`].
    pub fn evaluate(&self, record: &dyn Record) -> Value {
        match self {
            Expression::Literal(v) => v.clone(),
            Expression::Property(path) => record.property(path).unwrap_or(Value::Null),
            Expression::Arithmetic(a) => {
                let left = a.left.evaluate(record);
                let right = a.right.evaluate(record);
                numeric::arithmetic(a.op, &left, &right)
            }
            Expression::Function(call) => call.evaluate(record),
        }
    }

    /// Evaluate and convert to `kind`; `Null` when the conversion fails.
    pub fn evaluate_as(&self, record: &dyn Record, kind: ValueKind) -> Value {
        self.evaluate(record)
            .convert_to(kind)
            .unwrap_or(Value::Null)
    }

    /// Whether any node in the tree is a property reference.
    pub fn references_properties(&self) -> bool {
        match self {
            Expression::Literal(_) => false,
            Expression::Property(_) => true,
            Expression::Arithmetic(a) => {
                a.left.references_properties() || a.right.references_properties()
            }
            Expression::Function(call) => call.args().iter().any(Expression::references_properties),
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expression::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&str> {
        match self {
            Expression::Property(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Property(p) => f.write_str(p),
            Expression::Arithmetic(a) => write!(f, "({}{}{})", a.left, a.op.symbol(), a.right),
            Expression::Function(call) => write!(f, "{}", call),
        }
    }
}

// ──────────────────────────────────────────────
// Piecewise arithmetic construction
// ──────────────────────────────────────────────

/// Collects arithmetic operands one at a time, as a parser does.
///
/// An operand that was never supplied is a construction error. An operand
/// that evaluates to null is fine; the result is then null.
#[derive(Debug, Clone)]
pub struct ArithmeticBuilder {
    op: ArithmeticOp,
    left: Option<Expression>,
    right: Option<Expression>,
}

impl ArithmeticBuilder {
    pub fn new(op: ArithmeticOp) -> Self {
        ArithmeticBuilder {
            op,
            left: None,
            right: None,
        }
    }

    pub fn left(mut self, expr: Expression) -> Self {
        self.left = Some(expr);
        self
    }

    pub fn right(mut self, expr: Expression) -> Self {
        self.right = Some(expr);
        self
    }

    /// Fill the first unset operand. A third operand is an error.
    pub fn push(&mut self, expr: Expression) -> Result<()> {
        if self.left.is_none() {
            self.left = Some(expr);
        } else if self.right.is_none() {
            self.right = Some(expr);
        } else {
            return Err(FilterError::construction(format!(
                "'{}' takes exactly two operands",
                self.op.symbol()
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<Expression> {
        match (self.left, self.right) {
            (Some(left), Some(right)) => Ok(Expression::arithmetic(self.op, left, right)),
            (None, _) => Err(FilterError::construction(format!(
                "left operand of '{}' was never set",
                self.op.symbol()
            ))),
            (_, None) => Err(FilterError::construction(format!(
                "right operand of '{}' was never set",
                self.op.symbol()
            ))),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MapRecord;

    fn record() -> MapRecord {
        MapRecord::new()
            .with("width", 4i32)
            .with("height", 2.5f64)
            .with("label", "main")
            .with("nothing", Value::Null)
    }

    #[test]
    fn property_lookup() {
        let r = record();
        assert_eq!(Expression::property("width").evaluate(&r), Value::Int(4));
        assert_eq!(Expression::property("missing").evaluate(&r), Value::Null);
    }

    #[test]
    fn arithmetic_over_properties() {
        let r = record();
        let area = Expression::arithmetic(
            ArithmeticOp::Multiply,
            Expression::property("width"),
            Expression::property("height"),
        );
        assert_eq!(area.evaluate(&r), Value::Double(10.0));
        assert_eq!(area.to_string(), "(width*height)");
    }

    #[test]
    fn arithmetic_with_null_operand_is_null() {
        let r = record();
        let sum = Expression::arithmetic(
            ArithmeticOp::Add,
            Expression::property("nothing"),
            Expression::literal(1i32),
        );
        assert_eq!(sum.evaluate(&r), Value::Null);
    }

    #[test]
    fn builder_rejects_unset_operand() {
        let built = ArithmeticBuilder::new(ArithmeticOp::Add)
            .left(Expression::literal(1i32))
            .build();
        assert!(matches!(built, Err(FilterError::InvalidConstruction(_))));

        let built = ArithmeticBuilder::new(ArithmeticOp::Add)
            .right(Expression::literal(1i32))
            .build();
        assert!(matches!(built, Err(FilterError::InvalidConstruction(_))));
    }

    #[test]
    fn builder_push_fills_in_order() {
        let mut b = ArithmeticBuilder::new(ArithmeticOp::Subtract);
        b.push(Expression::literal(5i32)).unwrap();
        b.push(Expression::literal(2i32)).unwrap();
        assert!(b.push(Expression::literal(1i32)).is_err());
        assert_eq!(b.build().unwrap().evaluate(&()), Value::Long(3));
    }

    #[test]
    fn literal_cannot_wrap_literal() {
        let inner = Expression::literal(1i32);
        let result = Expression::wrap_literal(inner);
        assert!(matches!(result, Err(FilterError::InvalidConstruction(_))));
    }

    #[test]
    fn literal_folds_constant_expression() {
        let sum = Expression::arithmetic(
            ArithmeticOp::Add,
            Expression::literal(1i32),
            Expression::literal(2i32),
        );
        assert_eq!(
            Expression::wrap_literal(sum).unwrap(),
            Expression::Literal(Value::Long(3))
        );
        let reads = Expression::arithmetic(
            ArithmeticOp::Add,
            Expression::property("width"),
            Expression::literal(2i32),
        );
        assert!(Expression::wrap_literal(reads).is_err());
    }

    #[test]
    fn evaluate_as_converts_or_nulls() {
        let r = record();
        assert_eq!(
            Expression::literal("12").evaluate_as(&r, ValueKind::Int),
            Value::Int(12)
        );
        assert_eq!(
            Expression::property("label").evaluate_as(&r, ValueKind::Double),
            Value::Null
        );
    }

    #[test]
    fn evaluation_does_not_touch_record() {
        let r = record();
        let before = r.clone();
        let _ = Expression::property("width").evaluate(&r);
        assert_eq!(r, before);
    }
}
