//! Builder API.
//!
//! [`FilterFactory`] is the usual way to construct trees. It carries the
//! shared function registry for call lookup and the engine configuration
//! whose defaults (case sensitivity, Like limits, distance unit) fill in
//! whatever a caller leaves unspecified. Construction-time validation
//! happens here; evaluation never fails.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{FilterError, Result};
use crate::expression::{ArithmeticBuilder, ArithmeticOp, Expression, LiteralContent};
use crate::filter::{CompareOp, Filter, MatchAction, Spatial};
use crate::function::FunctionRegistry;
use crate::like::LikePattern;
use crate::spatial::{Distance, DistanceUnit, SpatialOp};
use crate::types::Value;

#[derive(Debug, Clone)]
pub struct FilterFactory {
    registry: Arc<FunctionRegistry>,
    config: EngineConfig,
}

impl Default for FilterFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FilterFactory {
    /// Build a factory over a registry and a configuration. The
    /// configuration is validated first.
    pub fn new(registry: Arc<FunctionRegistry>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(FilterFactory { registry, config })
    }

    /// Built-in functions and default configuration.
    pub fn with_defaults() -> Self {
        FilterFactory {
            registry: Arc::new(FunctionRegistry::with_builtins()),
            config: EngineConfig::default(),
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Expressions ──

    pub fn property(&self, path: impl Into<String>) -> Expression {
        Expression::property(path)
    }

    pub fn literal(&self, value: impl Into<Value>) -> Expression {
        Expression::literal(value)
    }

    /// A literal from a value or a constant expression. Wrapping a literal
    /// is rejected.
    pub fn literal_of(&self, content: impl Into<LiteralContent>) -> Result<Expression> {
        Expression::wrap_literal(content)
    }

    /// A call to a registered function. Unknown names and argument counts
    /// outside the declared bounds fail here.
    pub fn function(&self, name: &str, args: Vec<Expression>) -> Result<Expression> {
        self.registry.call(name, args).map(Expression::Function)
    }

    pub fn add(&self, left: Expression, right: Expression) -> Expression {
        Expression::arithmetic(ArithmeticOp::Add, left, right)
    }

    pub fn subtract(&self, left: Expression, right: Expression) -> Expression {
        Expression::arithmetic(ArithmeticOp::Subtract, left, right)
    }

    pub fn multiply(&self, left: Expression, right: Expression) -> Expression {
        Expression::arithmetic(ArithmeticOp::Multiply, left, right)
    }

    pub fn divide(&self, left: Expression, right: Expression) -> Expression {
        Expression::arithmetic(ArithmeticOp::Divide, left, right)
    }

    /// An arithmetic expression whose operands are supplied later.
    pub fn arithmetic(&self, op: ArithmeticOp) -> ArithmeticBuilder {
        ArithmeticBuilder::new(op)
    }

    // ── Comparisons ──

    /// A comparison using the configured default case sensitivity.
    pub fn compare(&self, op: CompareOp, left: Expression, right: Expression) -> Filter {
        self.compare_with_case(op, left, right, self.config.default_match_case)
    }

    pub fn compare_with_case(
        &self,
        op: CompareOp,
        left: Expression,
        right: Expression,
        match_case: bool,
    ) -> Filter {
        match Filter::compare(op, left, right) {
            Filter::Compare(mut c) => {
                c.match_case = match_case;
                Filter::Compare(c)
            }
            other => other,
        }
    }

    pub fn equal(&self, left: Expression, right: Expression) -> Filter {
        self.compare(CompareOp::Equal, left, right)
    }

    pub fn not_equal(&self, left: Expression, right: Expression) -> Filter {
        self.compare(CompareOp::NotEqual, left, right)
    }

    pub fn less(&self, left: Expression, right: Expression) -> Filter {
        self.compare(CompareOp::Less, left, right)
    }

    pub fn less_or_equal(&self, left: Expression, right: Expression) -> Filter {
        self.compare(CompareOp::LessOrEqual, left, right)
    }

    pub fn greater(&self, left: Expression, right: Expression) -> Filter {
        self.compare(CompareOp::Greater, left, right)
    }

    pub fn greater_or_equal(&self, left: Expression, right: Expression) -> Filter {
        self.compare(CompareOp::GreaterOrEqual, left, right)
    }

    pub fn between(&self, expr: Expression, lower: Expression, upper: Expression) -> Filter {
        Filter::between(expr, lower, upper)
    }

    /// A Like filter with the configured case sensitivity and limits.
    pub fn like(
        &self,
        expr: Expression,
        pattern: &str,
        wildcard_multi: &str,
        wildcard_single: &str,
        escape: &str,
    ) -> Result<Filter> {
        self.like_with_case(
            expr,
            pattern,
            wildcard_multi,
            wildcard_single,
            escape,
            self.config.default_match_case,
        )
    }

    pub fn like_with_case(
        &self,
        expr: Expression,
        pattern: &str,
        wildcard_multi: &str,
        wildcard_single: &str,
        escape: &str,
        match_case: bool,
    ) -> Result<Filter> {
        let pattern = LikePattern::new(
            pattern,
            wildcard_multi,
            wildcard_single,
            escape,
            match_case,
            &self.config.like,
        )?;
        Ok(Filter::like(expr, pattern))
    }

    pub fn is_null(&self, expr: Expression) -> Filter {
        Filter::is_null(expr)
    }

    // ── Spatial ──

    pub fn bbox(
        &self,
        expr: Expression,
        min: (f64, f64),
        max: (f64, f64),
        srs: Option<&str>,
    ) -> Filter {
        Filter::bbox(expr, min, max, srs)
    }

    /// Any topological predicate. Distance operators go through
    /// [`FilterFactory::dwithin`] and [`FilterFactory::beyond`].
    pub fn spatial(&self, op: SpatialOp, left: Expression, right: Expression) -> Result<Filter> {
        Filter::spatial(op, left, right)
    }

    pub fn equals(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Equals, left, right)
    }

    pub fn disjoint(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Disjoint, left, right)
    }

    pub fn intersects(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Intersects, left, right)
    }

    pub fn within(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Within, left, right)
    }

    pub fn contains(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Contains, left, right)
    }

    pub fn overlaps(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Overlaps, left, right)
    }

    pub fn touches(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Touches, left, right)
    }

    pub fn crosses(&self, left: Expression, right: Expression) -> Filter {
        topological(SpatialOp::Crosses, left, right)
    }

    pub fn dwithin(
        &self,
        left: Expression,
        right: Expression,
        distance: f64,
        units: &str,
    ) -> Result<Filter> {
        let distance = Distance::new(distance, self.unit(units)?);
        Filter::distance(SpatialOp::DWithin, left, right, distance)
    }

    pub fn beyond(
        &self,
        left: Expression,
        right: Expression,
        distance: f64,
        units: &str,
    ) -> Result<Filter> {
        let distance = Distance::new(distance, self.unit(units)?);
        Filter::distance(SpatialOp::Beyond, left, right, distance)
    }

    /// Resolve a unit name; blank means the configured default.
    pub fn unit(&self, units: &str) -> Result<DistanceUnit> {
        if units.trim().is_empty() {
            return Ok(self.config.distance_unit());
        }
        DistanceUnit::parse(units)
            .ok_or_else(|| FilterError::argument(format!("unknown distance unit '{}'", units)))
    }

    // ── Logic and identity ──

    pub fn and(&self, children: Vec<Filter>) -> Filter {
        Filter::and(children)
    }

    pub fn or(&self, children: Vec<Filter>) -> Filter {
        Filter::or(children)
    }

    pub fn not(&self, child: Filter) -> Filter {
        Filter::not(child)
    }

    pub fn id<I, S>(&self, ids: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::id(ids)
    }

    pub fn include(&self) -> Filter {
        Filter::Include
    }

    pub fn exclude(&self) -> Filter {
        Filter::Exclude
    }
}

fn topological(op: SpatialOp, left: Expression, right: Expression) -> Filter {
    Filter::Spatial(Spatial {
        op,
        left,
        right,
        distance: None,
        match_action: MatchAction::Any,
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MapRecord;

    #[test]
    fn default_case_sensitivity_from_config() {
        let config = EngineConfig {
            default_match_case: false,
            ..EngineConfig::default()
        };
        let ff = FilterFactory::new(Arc::new(FunctionRegistry::new()), config).unwrap();
        let record = MapRecord::new().with("name", "Ferry Road");
        assert!(ff.equal(ff.property("name"), ff.literal("FERRY ROAD")).evaluate(&record));
        let like = ff.like(ff.property("name"), "ferry*", "*", ".", "!").unwrap();
        assert!(like.evaluate(&record));

        let strict = FilterFactory::with_defaults();
        assert!(!strict.equal(strict.property("name"), strict.literal("FERRY ROAD")).evaluate(&record));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.like.max_wildcards = 0;
        let r = FilterFactory::new(Arc::new(FunctionRegistry::new()), config);
        assert!(matches!(r, Err(FilterError::Config(_))));
    }

    #[test]
    fn unknown_function_fails_at_construction() {
        let ff = FilterFactory::with_defaults();
        let r = ff.function("noSuchThing", vec![]);
        assert!(matches!(r, Err(FilterError::UnknownFunction { .. })));
        let r = ff.function("sqrt", vec![]);
        assert!(matches!(r, Err(FilterError::InvalidArgument(_))));
        assert!(ff.function("SQRT", vec![ff.literal(4i32)]).is_ok());
    }

    #[test]
    fn distance_units() {
        let ff = FilterFactory::with_defaults();
        assert_eq!(ff.unit("").unwrap(), DistanceUnit::Metre);
        assert_eq!(ff.unit("km").unwrap(), DistanceUnit::Kilometre);
        assert!(matches!(ff.unit("league"), Err(FilterError::InvalidArgument(_))));
        assert!(ff
            .dwithin(ff.property("geom"), ff.literal("POINT (0 0)"), -1.0, "m")
            .is_err());
    }

    #[test]
    fn arithmetic_builder_requires_both_operands() {
        let ff = FilterFactory::with_defaults();
        let mut builder = ff.arithmetic(ArithmeticOp::Add);
        builder.push(ff.literal(1i32)).unwrap();
        assert!(matches!(builder.clone().build(), Err(FilterError::InvalidConstruction(_))));
        builder.push(ff.literal(2i32)).unwrap();
        assert_eq!(builder.build().unwrap().evaluate(&()), Value::Long(3));
    }

    #[test]
    fn literal_of_literal_rejected() {
        let ff = FilterFactory::with_defaults();
        let inner = ff.literal(1i32);
        assert!(matches!(ff.literal_of(inner), Err(FilterError::InvalidConstruction(_))));
        let folded = ff.literal_of(ff.add(ff.literal(1i32), ff.literal(2i32))).unwrap();
        assert_eq!(folded.as_literal(), Some(&Value::Long(3)));
    }

    #[test]
    fn spatial_constructors() {
        let ff = FilterFactory::with_defaults();
        let record = MapRecord::new().with("geom", "POINT (5 5)");
        let square = ff.literal("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))");
        assert!(ff.within(ff.property("geom"), square.clone()).evaluate(&record));
        assert!(!ff.disjoint(ff.property("geom"), square.clone()).evaluate(&record));
        assert!(ff.spatial(SpatialOp::Beyond, ff.property("geom"), square).is_err());
    }
}
