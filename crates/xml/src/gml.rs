//! GML geometry reading and writing.
//!
//! Filter documents embed geometries as GML fragments. The codec hands
//! those fragments to a [`GeometryXml`] implementation; [`Gml2Reader`]
//! covers points, line strings, polygons and envelopes in both the GML2
//! (`coordinates`, `coord`, `Box`) and GML3 (`pos`, `posList`, `Envelope`)
//! spellings.

use geo_types::{coord, Coord, Geometry, LineString, Point, Polygon, Rect};
use geofilter_eval::{Crs, GeometryValue};

use crate::dom::XmlElement;
use crate::encode::XmlWriter;
use crate::error::{CodecError, Result};

/// Geometry collaborator for the XML codec.
pub trait GeometryXml: Send + Sync {
    /// Read a geometry element. `Ok(None)` when the element is not a
    /// geometry this reader knows.
    fn read(&self, element: &XmlElement) -> Result<Option<GeometryValue>>;

    /// Write a geometry as GML. Returns false when the geometry kind has
    /// no GML form here; the codec then falls back to WKT text.
    fn write(&self, geometry: &GeometryValue, out: &mut XmlWriter) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Gml2Reader;

impl GeometryXml for Gml2Reader {
    fn read(&self, element: &XmlElement) -> Result<Option<GeometryValue>> {
        let geometry = match element.name.as_str() {
            "Point" => {
                let c = single_coord(element)?;
                Geometry::Point(Point(c))
            }
            "LineString" => Geometry::LineString(LineString::new(coords(element)?)),
            "LinearRing" => Geometry::LineString(LineString::new(coords(element)?)),
            "Polygon" => Geometry::Polygon(polygon(element)?),
            "Envelope" => {
                let lower = corner(element, "lowerCorner")?;
                let upper = corner(element, "upperCorner")?;
                Geometry::Rect(Rect::new(lower, upper))
            }
            "Box" => {
                let cs = coords(element)?;
                if cs.len() != 2 {
                    return Err(CodecError::malformed("Box", "expects exactly two corners"));
                }
                Geometry::Rect(Rect::new(cs[0], cs[1]))
            }
            _ => return Ok(None),
        };
        let crs = element.attribute("srsName").and_then(Crs::new);
        Ok(Some(GeometryValue::new(geometry).with_crs(crs)))
    }

    fn write(&self, geometry: &GeometryValue, out: &mut XmlWriter) -> bool {
        let srs = geometry.crs.as_ref().map(|c| c.code().to_string());
        let attrs: Vec<(&str, &str)> = srs.iter().map(|s| ("srsName", s.as_str())).collect();
        match &geometry.geometry {
            Geometry::Point(p) => {
                out.start("gml:Point", &attrs);
                write_coordinates(out, std::iter::once(p.0));
                out.end("gml:Point");
            }
            Geometry::LineString(ls) => {
                out.start("gml:LineString", &attrs);
                write_coordinates(out, ls.coords().copied());
                out.end("gml:LineString");
            }
            Geometry::Polygon(poly) => {
                out.start("gml:Polygon", &attrs);
                write_ring(out, "gml:outerBoundaryIs", poly.exterior());
                for ring in poly.interiors() {
                    write_ring(out, "gml:innerBoundaryIs", ring);
                }
                out.end("gml:Polygon");
            }
            Geometry::Rect(r) => {
                out.start("gml:Box", &attrs);
                write_coordinates(out, [r.min(), r.max()].into_iter());
                out.end("gml:Box");
            }
            _ => return false,
        }
        true
    }
}

// ── Reading helpers ─────────────────────────────────────────────────

fn number(element: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| CodecError::InvalidNumber {
            element: element.to_string(),
            text: text.to_string(),
        })
}

/// Pair up a flat run of ordinates into 2D coordinates.
fn pairs(element: &str, ordinates: &[f64]) -> Result<Vec<Coord<f64>>> {
    if ordinates.len() % 2 != 0 {
        return Err(CodecError::malformed(element, "odd number of ordinates"));
    }
    Ok(ordinates
        .chunks(2)
        .map(|xy| coord! { x: xy[0], y: xy[1] })
        .collect())
}

fn split_numbers(element: &str, text: &str) -> Result<Vec<f64>> {
    text.split_whitespace().map(|t| number(element, t)).collect()
}

/// `gml:coordinates`: tuples split by `ts`, ordinates by `cs`.
fn parse_coordinates(element: &XmlElement) -> Result<Vec<Coord<f64>>> {
    let cs = element.attribute("cs").unwrap_or(",");
    let ts = element.attribute("ts").unwrap_or(" ");
    let text = element.trimmed_text();
    let tuples: Vec<&str> = if ts.trim().is_empty() {
        text.split_whitespace().collect()
    } else {
        text.split(ts).map(str::trim).filter(|t| !t.is_empty()).collect()
    };
    tuples
        .into_iter()
        .map(|tuple| {
            let ordinates: Vec<&str> = tuple.split(cs).map(str::trim).collect();
            match ordinates.as_slice() {
                [x, y, ..] => Ok(coord! { x: number("coordinates", x)?, y: number("coordinates", y)? }),
                _ => Err(CodecError::malformed("coordinates", format!("bad tuple '{}'", tuple))),
            }
        })
        .collect()
}

/// `gml:coord` with `X` and `Y` children.
fn parse_coord(element: &XmlElement) -> Result<Coord<f64>> {
    let axis = |name: &str| {
        element
            .child(name)
            .ok_or_else(|| CodecError::malformed("coord", format!("missing {}", name)))
            .and_then(|e| number(name, e.trimmed_text()))
    };
    Ok(coord! { x: axis("X")?, y: axis("Y")? })
}

/// Coordinates of a point, line or ring in any supported spelling.
fn coords(element: &XmlElement) -> Result<Vec<Coord<f64>>> {
    if let Some(c) = element.child("coordinates") {
        return parse_coordinates(c);
    }
    if let Some(list) = element.child("posList") {
        return pairs("posList", &split_numbers("posList", list.trimmed_text())?);
    }
    let mut out = Vec::new();
    for child in &element.children {
        match child.name.as_str() {
            "coord" => out.push(parse_coord(child)?),
            "pos" => out.extend(pairs("pos", &split_numbers("pos", child.trimmed_text())?)?),
            _ => {}
        }
    }
    Ok(out)
}

fn single_coord(element: &XmlElement) -> Result<Coord<f64>> {
    let cs = coords(element)?;
    match cs.as_slice() {
        [c] => Ok(*c),
        _ => Err(CodecError::malformed(
            &element.name,
            format!("expects one coordinate, found {}", cs.len()),
        )),
    }
}

fn corner(element: &XmlElement, name: &str) -> Result<Coord<f64>> {
    let text = element
        .child(name)
        .ok_or_else(|| CodecError::malformed(&element.name, format!("missing {}", name)))?
        .trimmed_text();
    match pairs(name, &split_numbers(name, text)?)?.as_slice() {
        [c] => Ok(*c),
        _ => Err(CodecError::malformed(name, "expects one position")),
    }
}

fn ring(boundary: &XmlElement) -> Result<LineString<f64>> {
    let ring = boundary
        .child("LinearRing")
        .ok_or_else(|| CodecError::malformed(&boundary.name, "missing LinearRing"))?;
    Ok(LineString::new(coords(ring)?))
}

fn polygon(element: &XmlElement) -> Result<Polygon<f64>> {
    let outer = element
        .child("outerBoundaryIs")
        .or_else(|| element.child("exterior"))
        .ok_or_else(|| CodecError::malformed("Polygon", "missing outer boundary"))?;
    let mut interiors = Vec::new();
    for child in &element.children {
        if child.name == "innerBoundaryIs" || child.name == "interior" {
            interiors.push(ring(child)?);
        }
    }
    Ok(Polygon::new(ring(outer)?, interiors))
}

// ── Writing helpers ─────────────────────────────────────────────────

fn write_coordinates(out: &mut XmlWriter, coords: impl Iterator<Item = Coord<f64>>) {
    let text = coords
        .map(|c| format!("{},{}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(" ");
    out.start("gml:coordinates", &[]);
    out.text(&text);
    out.end("gml:coordinates");
}

fn write_ring(out: &mut XmlWriter, boundary: &str, ring: &LineString<f64>) {
    out.start(boundary, &[]);
    out.start("gml:LinearRing", &[]);
    write_coordinates(out, ring.coords().copied());
    out.end("gml:LinearRing");
    out.end(boundary);
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
