//! SOAP document building and response parsing for the platform's object API.

pub mod document;
pub mod envelope;
pub mod response;

pub use document::{Element, Node, XmlError};
pub use envelope::{Filter, RetrieveRequest, SoapAction, SoapRequest};
pub use response::{CreateObjectResult, CreateResult, RetrieveResult, SoapResponse, XmlNode};
