//! Parsing of SOAP responses into a nested element tree.
//!
//! Callers pull individual values (folder id, overall status, new object id)
//! out of the tree by fixed path. Element names are stored without their
//! namespace prefix.

use super::document::XmlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parses `xml` and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlNode, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                XmlError::Malformed(format!("at position {}: {e}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(start) => stack.push(node_from_start(&start)?),
                Event::Empty(start) => {
                    let node = node_from_start(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Malformed(format!(
                "element '{}' is never closed",
                open.name
            )));
        }
        root.ok_or_else(|| XmlError::Malformed("document has no root element".into()))
    }

    /// First child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child named `name`, if present and non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// Follows `path` from this node, one child name per step.
    pub fn path(&self, path: &[&str]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Like [`XmlNode::path`] but reports the missing path as an error.
    pub fn require_path(&self, path: &[&str]) -> Result<&XmlNode, XmlError> {
        self.path(path)
            .ok_or_else(|| XmlError::MissingNode(format!("{}/{}", self.name, path.join("/"))))
    }

    /// Depth-first search for the first descendant named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }
}

fn node_from_start(start: &BytesStart<'_>) -> Result<XmlNode, XmlError> {
    let name = std::str::from_utf8(start.local_name().as_ref())
        .map_err(|e| XmlError::Malformed(e.to_string()))?
        .to_string();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = std::str::from_utf8(attribute.key.local_name().as_ref())
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlNode {
        name,
        attributes,
        ..XmlNode::default()
    })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(XmlError::Malformed("multiple root elements".into())),
    }
    Ok(())
}

/// A parsed SOAP response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    root: XmlNode,
    raw: String,
}

impl SoapResponse {
    pub fn parse(raw: impl Into<String>) -> Result<Self, XmlError> {
        let raw = raw.into();
        let root = XmlNode::parse(&raw)?;
        if root.name != "Envelope" {
            return Err(XmlError::MissingNode("Envelope".into()));
        }
        Ok(Self { root, raw })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    pub fn body(&self) -> Result<&XmlNode, XmlError> {
        self.root.require_path(&["Body"])
    }

    /// Fault text when the body carries a SOAP 1.1 or 1.2 fault.
    pub fn fault(&self) -> Option<String> {
        let fault = self.root.path(&["Body", "Fault"])?;
        let text = fault
            .child_text("faultstring")
            .or_else(|| fault.path(&["Reason", "Text"]).map(|n| n.text.trim()))
            .unwrap_or("SOAP fault");
        Some(text.to_string())
    }
}

/// Outcome of a `Retrieve` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveResult {
    pub overall_status: String,
    pub request_id: Option<String>,
    pub results: Vec<XmlNode>,
}

impl RetrieveResult {
    pub fn from_response(response: &SoapResponse) -> Result<Self, XmlError> {
        let message = response.body()?.require_path(&["RetrieveResponseMsg"])?;
        let overall_status = message
            .child_text("OverallStatus")
            .ok_or_else(|| XmlError::MissingNode("RetrieveResponseMsg/OverallStatus".into()))?
            .to_string();
        Ok(Self {
            overall_status,
            request_id: message.child_text("RequestID").map(str::to_string),
            results: message.children_named("Results").cloned().collect(),
        })
    }

    /// `OK` and `MoreDataAvailable` both mean the call succeeded.
    pub fn is_ok(&self) -> bool {
        self.overall_status == "OK" || self.overall_status == "MoreDataAvailable"
    }

    /// Text of `property` on the first result.
    pub fn first_value(&self, property: &str) -> Option<&str> {
        self.results.first().and_then(|r| r.child_text(property))
    }
}

/// Per-object status inside a `CreateResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateObjectResult {
    pub status_code: Option<String>,
    pub status_message: Option<String>,
    pub new_id: Option<String>,
    pub error_code: Option<String>,
}

/// Outcome of a `Create` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResult {
    pub overall_status: String,
    pub results: Vec<CreateObjectResult>,
}

impl CreateResult {
    pub fn from_response(response: &SoapResponse) -> Result<Self, XmlError> {
        let message = response.body()?.require_path(&["CreateResponse"])?;
        let overall_status = message
            .child_text("OverallStatus")
            .ok_or_else(|| XmlError::MissingNode("CreateResponse/OverallStatus".into()))?
            .to_string();
        let results = message
            .children_named("Results")
            .map(|r| CreateObjectResult {
                status_code: r.child_text("StatusCode").map(str::to_string),
                status_message: r.child_text("StatusMessage").map(str::to_string),
                new_id: r.child_text("NewID").map(str::to_string),
                error_code: r.child_text("ErrorCode").map(str::to_string),
            })
            .collect();
        Ok(Self {
            overall_status,
            results,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.overall_status == "OK"
    }

    /// `NewID` of the first created object.
    pub fn new_id(&self) -> Option<&str> {
        self.results.first().and_then(|r| r.new_id.as_deref())
    }

    /// Status messages of all results, joined for display.
    pub fn status_message(&self) -> String {
        let messages: Vec<&str> = self
            .results
            .iter()
            .filter_map(|r| r.status_message.as_deref())
            .collect();
        if messages.is_empty() {
            self.overall_status.clone()
        } else {
            messages.join("; ")
        }
    }
}
