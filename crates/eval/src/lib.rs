//! Geofilter evaluator -- builds filter and expression trees and evaluates
//! them against records.
//!
//! Trees are constructed through [`FilterFactory`] (or the XML codec in
//! `geofilter-xml`), evaluated with [`Filter::evaluate`] against anything
//! implementing [`Record`], split between a backend and local evaluation
//! with [`split_filter`], and analysed with the [`visitor`] and
//! [`transform`] modules.
//!
//! Evaluation is pure: trees, records and registries are never mutated, so
//! one tree can be evaluated from many threads at once.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod expression;
pub mod factory;
pub mod filter;
pub mod function;
pub mod like;
pub mod numeric;
pub mod predicate;
pub mod record;
pub mod spatial;
pub mod transform;
pub mod types;
pub mod visitor;

pub use capabilities::{split_filter, Capabilities, OperatorTag, SplitFilter};
pub use config::{EngineConfig, LikeLimits};
pub use error::{FilterError, Result};
pub use expression::{Arithmetic, ArithmeticBuilder, ArithmeticOp, Expression, LiteralContent};
pub use factory::FilterFactory;
pub use filter::{Between, CompareOp, Comparison, Filter, Like, MatchAction, Spatial};
pub use function::{
    FunctionCall, FunctionDescriptor, FunctionImpl, FunctionParameter, FunctionRegistry,
    ParameterType,
};
pub use like::LikePattern;
pub use record::{MapRecord, Record};
pub use spatial::{Distance, DistanceUnit, GeoOps, GeometryOps, SpatialOp};
pub use transform::{attribute_names, expression_attribute_names, invert_envelope, remove_filter};
pub use types::{parse_wkt, Crs, CrsFrame, GeometryValue, Value, ValueKind, METRES_PER_DEGREE};
pub use visitor::Visitor;
