//! Minimal element tree built on top of `quick-xml`.
//!
//! Scene flow records are small, fixed-shape documents, so the decoder only
//! needs two things from an XML library: look up the first child element with
//! a given name, and pull the text content out of an element. This module
//! builds an owned tree from the `quick-xml` event stream that offers exactly
//! that.

use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Errors that can occur while loading an XML document.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element ('{0}')")]
    MultipleRoots(String),

    #[error("element '{0}' is never closed")]
    Unclosed(String),
}

/// Result type for XML operations.
pub type Result<T> = std::result::Result<T, XmlError>;

/// A single element with its direct text and child elements.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: String,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: String) -> Self {
        Self {
            name,
            text: None,
            children: Vec::new(),
        }
    }

    /// Tag name of this element.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content directly inside this element, if any.
    ///
    /// Whitespace-only text is not recorded, so `<data>  </data>` has no text.
    /// Text segments separated by comments or CDATA sections are joined with a
    /// single space.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// First child element with the given tag name.
    pub fn first_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All child elements in document order.
    #[inline]
    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    fn push_text(&mut self, text: &str) {
        match self.text {
            Some(ref mut existing) => {
                // Segments arrive trimmed; keep them apart so tokens split
                // by a comment or CDATA boundary do not merge.
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(text);
            }
            None => self.text = Some(text.to_string()),
        }
    }
}

/// A parsed XML document with a single root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Load and parse a document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::parse(&bytes)
    }

    /// Parse a document from a string.
    pub fn parse_str(source: &str) -> Result<Self> {
        Self::parse(source.as_bytes())
    }

    /// Parse a document from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event_into(&mut buf);
            match event.map_err(|source| XmlError::Syntax {
                position: reader.buffer_position(),
                source,
            })? {
                Event::Start(tag) => {
                    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                    stack.push(XmlElement::new(name));
                }
                Event::Empty(tag) => {
                    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                    attach(&mut stack, &mut root, XmlElement::new(name))?;
                }
                Event::End(_) => {
                    // quick-xml checks end names, so an unmatched end tag is
                    // already a syntax error by the time we get here.
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    let unescaped = text.unescape().map_err(|source| XmlError::Syntax {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&unescaped);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }

        root.map(|root| XmlDocument { root }).ok_or(XmlError::NoRoot)
    }

    /// The document's root element.
    #[inline]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }
}

/// Attach a finished element to its parent, or make it the root.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }

    if root.is_some() {
        return Err(XmlError::MultipleRoots(element.name));
    }
    *root = Some(element);
    Ok(())
}
