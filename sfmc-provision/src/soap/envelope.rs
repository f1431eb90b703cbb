//! SOAP 1.1 envelopes and request bodies for the platform's object API.
//!
//! Authentication travels inside the envelope header as a `fueloauth`
//! element, not as an HTTP header.

use super::document::{Element, XmlError};
use std::fmt;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const PARTNER_API_NS: &str = "http://exacttarget.com/wsdl/partnerAPI";
pub const FUEL_OAUTH_NS: &str = "http://exacttarget.com";

/// Object API verb, sent as the `SOAPAction` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapAction {
    Retrieve,
    Create,
}

impl SoapAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoapAction::Retrieve => "Retrieve",
            SoapAction::Create => "Create",
        }
    }
}

impl fmt::Display for SoapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wraps `body` in an envelope authenticated with `access_token`.
pub fn envelope(access_token: &str, body: Element) -> Element {
    Element::new("soap:Envelope")
        .attr("xmlns:soap", SOAP_ENVELOPE_NS)
        .attr("xmlns:xsi", XSI_NS)
        .child(
            Element::new("soap:Header").child(
                Element::with_text("fueloauth", access_token).attr("xmlns", FUEL_OAUTH_NS),
            ),
        )
        .child(Element::new("soap:Body").child(body))
}

/// A request body paired with the action it performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    pub action: SoapAction,
    pub body: Element,
}

impl SoapRequest {
    pub fn new(action: SoapAction, body: Element) -> Self {
        Self { action, body }
    }

    /// Serializes the complete envelope for `access_token`.
    pub fn render(&self, access_token: &str) -> Result<String, XmlError> {
        envelope(access_token, self.body.clone()).to_document()
    }
}

/// Retrieve filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `property equals value`
    Equals { property: String, value: String },
    /// Both operands must match
    And(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    fn to_element(&self, element_name: &str) -> Element {
        match self {
            Filter::Equals { property, value } => Element::new(element_name)
                .attr("xsi:type", "SimpleFilterPart")
                .text_child("Property", property.as_str())
                .text_child("SimpleOperator", "equals")
                .text_child("Value", value.as_str()),
            Filter::And(left, right) => Element::new(element_name)
                .attr("xsi:type", "ComplexFilterPart")
                .child(left.to_element("LeftOperand"))
                .text_child("LogicalOperator", "AND")
                .child(right.to_element("RightOperand")),
        }
    }
}

/// `RetrieveRequestMsg` for one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    object_type: String,
    properties: Vec<String>,
    filter: Option<Filter>,
}

impl RetrieveRequest {
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            properties: Vec::new(),
            filter: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties.push(name.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn into_request(self) -> SoapRequest {
        let mut inner = Element::new("RetrieveRequest").text_child("ObjectType", self.object_type);
        for property in self.properties {
            inner = inner.text_child("Properties", property);
        }
        if let Some(filter) = &self.filter {
            inner.push(filter.to_element("Filter"));
        }
        let body = Element::new("RetrieveRequestMsg")
            .attr("xmlns", PARTNER_API_NS)
            .child(inner);
        SoapRequest::new(SoapAction::Retrieve, body)
    }
}

/// `CreateRequest` holding a single object.
pub fn create_request(object: Element) -> SoapRequest {
    let body = Element::new("CreateRequest")
        .attr("xmlns", PARTNER_API_NS)
        .child(object);
    SoapRequest::new(SoapAction::Create, body)
}
