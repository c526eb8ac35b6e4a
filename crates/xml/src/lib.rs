//! XML filter documents for geofilter.
//!
//! [`parse_filter`] reads an OGC filter document (with or without the
//! `Filter` wrapper) into a [`geofilter_eval::Filter`]; [`encode_filter`]
//! writes one back. Geometry fragments go through a [`GeometryXml`]
//! implementation, GML2 by default.

pub mod dom;
pub mod encode;
pub mod error;
pub mod gml;
pub mod parse;

pub use dom::{read_document, read_document_bounded, XmlElement};
pub use encode::{encode_filter, FilterEncoder, XmlWriter, GML_NAMESPACE, OGC_NAMESPACE};
pub use error::{CodecError, Result};
pub use gml::{GeometryXml, Gml2Reader};
pub use parse::{parse_filter, FilterParser};
