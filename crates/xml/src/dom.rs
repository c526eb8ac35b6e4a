//! A minimal element tree built from the quick-xml event stream.
//!
//! Names are kept by local part only, so `ogc:PropertyName` and
//! `PropertyName` read the same. Namespace declarations are dropped.
//! Character data is accumulated across every text and CDATA event of an
//! element, so long text split over several reads arrives whole.
//! Nesting is bounded; a document deeper than the limit is rejected
//! before any tree is built past it.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use geofilter_eval::EngineConfig;

use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Attribute value by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Read every top-level element of a document with the default nesting
/// limit.
pub fn read_document(content: &str) -> Result<Vec<XmlElement>> {
    read_document_bounded(content, EngineConfig::default().max_nesting_depth)
}

/// Read every top-level element, failing once more than `max_depth`
/// elements are open at the same time.
pub fn read_document_bounded(content: &str, max_depth: usize) -> Result<Vec<XmlElement>> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut roots = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let element = open(e)?;
                check_depth(&element, stack.len() + 1, max_depth)?;
                stack.push(element);
            }
            Event::Empty(ref e) => {
                let element = open(e)?;
                check_depth(&element, stack.len() + 1, max_depth)?;
                attach(element, &mut stack, &mut roots);
            }
            Event::Text(ref e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(element, &mut stack, &mut roots);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Elements still open at end of input.
    while let Some(element) = stack.pop() {
        attach(element, &mut stack, &mut roots);
    }
    Ok(roots)
}

fn open(e: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = attr.key;
        if key.as_ref() == b"xmlns" || key.as_ref().starts_with(b"xmlns:") {
            continue;
        }
        let local = String::from_utf8_lossy(key.local_name().as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        attributes.push((local, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn check_depth(element: &XmlElement, depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(CodecError::malformed(
            &element.name,
            format!("nesting exceeds {} levels", max_depth),
        ));
    }
    Ok(())
}

fn attach(element: XmlElement, stack: &mut [XmlElement], roots: &mut Vec<XmlElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
