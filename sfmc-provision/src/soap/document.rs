//! Element tree used to assemble outgoing XML documents.
//!
//! Documents are built as a tree and serialized once at the end through
//! `quick-xml`, which escapes every text node and attribute value. Nothing in
//! this crate concatenates XML strings by hand.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

/// XML building and parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// Serializing the element tree failed
    #[error("failed to write XML: {0}")]
    Write(String),

    /// The input is not well-formed XML
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// A node expected at a fixed path is absent
    #[error("missing element '{0}'")]
    MissingNode(String),
}

/// Child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// One XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node: `<name>text</name>`.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).text(text)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Appends `<name>text</name>` as a child.
    pub fn text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.child(Element::with_text(name, text))
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements named `name`.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Serializes the tree as a complete document with an XML declaration.
    pub fn to_document(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        self.write_to(&mut writer)?;
        into_string(writer)
    }

    /// Serializes the tree without a declaration.
    pub fn to_fragment(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        into_string(writer)
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::Write(e.to_string()));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_to(writer)?,
                Node::Text(text) => writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(|e| XmlError::Write(e.to_string()))?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| XmlError::Write(e.to_string()))
    }
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, XmlError> {
    String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
}
