//! Spatial operators and the geometry collaborator seam.
//!
//! Filters only pick the predicate and interpret its answer. The
//! topological work itself goes through [`GeometryOps`]; [`GeoOps`] is
//! the default implementation on top of the `geo` crate.

use geo::{MapCoords, Relate};
use geo_types::{coord, Geometry};

use crate::types::{CrsFrame, GeometryValue, METRES_PER_DEGREE};

/// Spatial predicates. `DWithin` and `Beyond` carry a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpatialOp {
    Equals,
    Disjoint,
    Intersects,
    Within,
    Contains,
    Overlaps,
    Touches,
    Crosses,
    BBox,
    DWithin,
    Beyond,
}

impl SpatialOp {
    pub fn is_distance(&self) -> bool {
        matches!(self, SpatialOp::DWithin | SpatialOp::Beyond)
    }
}

/// Units accepted for DWithin/Beyond distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceUnit {
    Metre,
    Kilometre,
    Mile,
    Foot,
    NauticalMile,
}

impl DistanceUnit {
    /// Parse a unit name or abbreviation (case-insensitive). Empty input is
    /// not a unit; callers substitute their configured default.
    pub fn parse(name: &str) -> Option<DistanceUnit> {
        match name.trim().to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Some(DistanceUnit::Metre),
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Some(DistanceUnit::Kilometre)
            }
            "mi" | "mile" | "miles" => Some(DistanceUnit::Mile),
            "ft" | "foot" | "feet" => Some(DistanceUnit::Foot),
            "nm" | "nmi" | "nautical mile" | "nautical miles" | "nautical_mile" => {
                Some(DistanceUnit::NauticalMile)
            }
            _ => None,
        }
    }

    pub fn metres_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Metre => 1.0,
            DistanceUnit::Kilometre => 1000.0,
            DistanceUnit::Mile => 1609.344,
            DistanceUnit::Foot => 0.3048,
            DistanceUnit::NauticalMile => 1852.0,
        }
    }

    pub fn to_metres(&self, value: f64) -> f64 {
        value * self.metres_per_unit()
    }

    /// Canonical abbreviation, as written back out.
    pub fn symbol(&self) -> &'static str {
        match self {
            DistanceUnit::Metre => "m",
            DistanceUnit::Kilometre => "km",
            DistanceUnit::Mile => "mi",
            DistanceUnit::Foot => "ft",
            DistanceUnit::NauticalMile => "nm",
        }
    }
}

/// A DWithin/Beyond distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    pub value: f64,
    pub unit: DistanceUnit,
}

impl Distance {
    pub fn new(value: f64, unit: DistanceUnit) -> Self {
        Distance { value, unit }
    }

    /// Threshold in the coordinate units of `frame`: metres on a plane,
    /// degrees of latitude on a geographic system. Geographic distances are
    /// measured after longitudes are scaled to the pair's latitude (see
    /// [`evaluate`]), so one degree stands for the same ground length on
    /// both axes.
    pub fn threshold(&self, frame: CrsFrame) -> f64 {
        let metres = self.unit.to_metres(self.value);
        match frame {
            CrsFrame::Planar => metres,
            CrsFrame::Geographic => metres / METRES_PER_DEGREE,
        }
    }
}

/// Geometry predicates used by spatial filters.
pub trait GeometryOps: Send + Sync {
    /// Evaluate a topological predicate. `BBox` is an intersection test
    /// against the envelope on the right. Distance operators are answered
    /// through [`GeometryOps::distance`] instead.
    fn test(&self, op: SpatialOp, left: &Geometry<f64>, right: &Geometry<f64>) -> bool;

    /// Shortest distance between two geometries in coordinate units.
    fn distance(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> f64;
}

/// [`GeometryOps`] backed by the `geo` crate's DE-9IM relate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoOps;

impl GeometryOps for GeoOps {
    fn test(&self, op: SpatialOp, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        let matrix = left.relate(right);
        match op {
            SpatialOp::Equals => matrix.is_equal_topo(),
            SpatialOp::Disjoint => matrix.is_disjoint(),
            SpatialOp::Intersects | SpatialOp::BBox => matrix.is_intersects(),
            SpatialOp::Within => matrix.is_within(),
            SpatialOp::Contains => matrix.is_contains(),
            SpatialOp::Overlaps => matrix.is_overlaps(),
            SpatialOp::Touches => matrix.is_touches(),
            SpatialOp::Crosses => matrix.is_crosses(),
            SpatialOp::DWithin | SpatialOp::Beyond => false,
        }
    }

    fn distance(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> f64 {
        planar_distance(left, right)
    }
}

/// Euclidean distance between any two geometries.
#[allow(deprecated)]
pub fn planar_distance(left: &Geometry<f64>, right: &Geometry<f64>) -> f64 {
    use geo::EuclideanDistance;
    left.euclidean_distance(right)
}

/// Apply a spatial operator to two geometry values.
pub(crate) fn evaluate(
    ops: &dyn GeometryOps,
    op: SpatialOp,
    distance: Option<&Distance>,
    left: &GeometryValue,
    right: &GeometryValue,
) -> bool {
    match (op, distance) {
        (SpatialOp::DWithin | SpatialOp::Beyond, Some(d)) => {
            let frame = if left.frame() == CrsFrame::Geographic
                || right.frame() == CrsFrame::Geographic
            {
                CrsFrame::Geographic
            } else {
                CrsFrame::Planar
            };
            let actual = match frame {
                CrsFrame::Geographic => match equirectangular(left, right) {
                    Some((l, r)) => ops.distance(&l, &r),
                    None => ops.distance(&left.geometry, &right.geometry),
                },
                CrsFrame::Planar => ops.distance(&left.geometry, &right.geometry),
            };
            if actual.is_nan() {
                return false;
            }
            let threshold = d.threshold(frame);
            if op == SpatialOp::DWithin {
                actual <= threshold
            } else {
                actual > threshold
            }
        }
        (SpatialOp::DWithin | SpatialOp::Beyond, None) => false,
        _ => ops.test(op, &left.geometry, &right.geometry),
    }
}

/// Both geometries with longitudes multiplied by the cosine of the
/// pair's mean latitude. Accurate for pairs that are close together
/// relative to the earth's radius.
fn equirectangular(
    left: &GeometryValue,
    right: &GeometryValue,
) -> Option<(Geometry<f64>, Geometry<f64>)> {
    let (a, b) = (left.envelope()?, right.envelope()?);
    let lat = (a.min().y.min(b.min().y) + a.max().y.max(b.max().y)) / 2.0;
    let k = lat.to_radians().cos();
    let scale = |g: &Geometry<f64>| g.map_coords(|c| coord! { x: c.x * k, y: c.y });
    Some((scale(&left.geometry), scale(&right.geometry)))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
