//! Runtime value types for the filter engine.
//!
//! Values are produced by evaluating expressions against a record and are
//! never mutated once built.

pub mod geometry;
pub mod values;

pub use geometry::{parse_wkt, Crs, CrsFrame, GeometryValue, METRES_PER_DEGREE};
pub use values::{parse_date, parse_time, parse_timestamp, Value, ValueKind};
