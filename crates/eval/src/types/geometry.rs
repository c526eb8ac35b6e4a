//! Geometry values and coordinate reference systems.

use std::fmt;
use std::str::FromStr;

use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use wkt::ToWkt;

/// Metres spanned by one degree of arc at the equator.
pub const METRES_PER_DEGREE: f64 = 111_319.490_793_273_58;

/// EPSG codes of the geographic (longitude/latitude) systems we recognise.
const GEOGRAPHIC_CODES: &[&str] = &["4326", "4269", "4258", "4979", "CRS84"];

/// A coordinate reference system identifier, e.g. `EPSG:4326`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crs(String);

/// How distances in a reference system are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsFrame {
    /// Coordinates are metres on a projected plane.
    Planar,
    /// Coordinates are degrees of longitude/latitude.
    Geographic,
}

impl Crs {
    /// Build an identifier. Blank identifiers mean "unspecified" and
    /// return `None`.
    pub fn new(code: impl Into<String>) -> Option<Crs> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Crs(trimmed.to_string()))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Classify the identifier. Accepts `EPSG:4326`, `CRS:84`, the
    /// `urn:ogc:def:crs:...` forms and the `...EPSG.xml#4326` form.
    pub fn frame(&self) -> CrsFrame {
        let upper = self.0.to_ascii_uppercase();
        if upper == "CRS:84" {
            return CrsFrame::Geographic;
        }
        let tail = upper
            .rsplit(|c: char| c == ':' || c == '#' || c == '/')
            .next()
            .unwrap_or("");
        if GEOGRAPHIC_CODES.contains(&tail) {
            CrsFrame::Geographic
        } else {
            CrsFrame::Planar
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A geometry together with the reference system its coordinates are in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryValue {
    pub geometry: Geometry<f64>,
    pub crs: Option<Crs>,
}

impl GeometryValue {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        GeometryValue {
            geometry: geometry.into(),
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Parse well-known text. Returns `None` for anything that is not WKT.
    pub fn from_wkt(text: &str) -> Option<GeometryValue> {
        parse_wkt(text).map(GeometryValue::new)
    }

    /// Reference frame; geometries without a CRS are planar.
    pub fn frame(&self) -> CrsFrame {
        self.crs
            .as_ref()
            .map(Crs::frame)
            .unwrap_or(CrsFrame::Planar)
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn to_wkt_string(&self) -> String {
        self.geometry.wkt_string()
    }
}

impl From<Geometry<f64>> for GeometryValue {
    fn from(geometry: Geometry<f64>) -> Self {
        GeometryValue::new(geometry)
    }
}

impl fmt::Display for GeometryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt_string())
    }
}

/// Parse WKT into a geo-types geometry.
pub fn parse_wkt(text: &str) -> Option<Geometry<f64>> {
    let parsed = wkt::Wkt::<f64>::from_str(text.trim()).ok()?;
    let geometry: Result<Geometry<f64>, wkt::conversion::Error> = parsed.try_into();
    geometry.ok()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    #[test]
    fn blank_crs_is_unspecified() {
        assert_eq!(Crs::new(""), None);
        assert_eq!(Crs::new("   "), None);
        assert_eq!(Crs::new("EPSG:4326").unwrap().code(), "EPSG:4326");
    }

    #[test]
    fn geographic_forms_recognised() {
        for code in [
            "EPSG:4326",
            "epsg:4326",
            "CRS:84",
            "urn:ogc:def:crs:EPSG::4326",
            "urn:ogc:def:crs:OGC:1.3:CRS84",
            "http://www.opengis.net/gml/srs/epsg.xml#4326",
        ] {
            assert_eq!(Crs::new(code).unwrap().frame(), CrsFrame::Geographic, "{}", code);
        }
        assert_eq!(Crs::new("EPSG:3857").unwrap().frame(), CrsFrame::Planar);
    }

    #[test]
    fn wkt_parse_and_render() {
        let g = GeometryValue::from_wkt("POINT (1 2)").unwrap();
        assert_eq!(g.geometry, Geometry::Point(point!(x: 1.0, y: 2.0)));
        assert_eq!(g.frame(), CrsFrame::Planar);
        assert!(GeometryValue::from_wkt("not a geometry").is_none());
        let round = GeometryValue::from_wkt(&g.to_wkt_string()).unwrap();
        assert_eq!(round, g);
    }

    #[test]
    fn envelope_of_polygon() {
        let g = GeometryValue::from_wkt("POLYGON ((10 10, 15 10, 15 15, 10 15, 10 10))").unwrap();
        let env = g.envelope().unwrap();
        assert_eq!(env.min().x, 10.0);
        assert_eq!(env.max().y, 15.0);
    }
}
