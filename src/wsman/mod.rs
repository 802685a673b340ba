//! WS-Management client layer.
//!
//! This module speaks the subset of WS-Management that AMT power control needs:
//! a WS-Transfer `Get` and a custom-action `Invoke`, both against a resource URI,
//! with an optional selector set.
//!
//! # Layers
//!
//! - [`xml`]: owned, namespace-aware element tree used for requests and responses
//! - [`transport`]: the [`WsManTransport`] trait and its HTTP implementation
//! - [`client`]: [`WsManClient`], which classifies responses into an [`Outcome`]
//!   and tracks when the host was last contacted
//! - [`wake`]: the wake-up probe issued to idle hosts

pub mod client;
pub mod config;
pub mod digest;
pub mod transport;
pub mod wake;
pub mod xml;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub use client::WsManClient;
pub use config::{ConnectionConfig, Scheme, DEFAULT_PORT, DEFAULT_WAKEUP_INTERVAL};
pub use transport::{HttpTransport, TransportError, WsManTransport};
pub use wake::{PingProbe, WakeProbe};
pub use xml::{Attribute, Element, XmlError};

// ============================================================================
// Namespaces
// ============================================================================

/// SOAP 1.2 envelope namespace.
pub const NS_SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WS-Addressing namespace.
pub const NS_WSA: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";

/// WS-Management namespace.
pub const NS_WSMAN: &str = "http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd";

/// WS-Addressing anonymous reply-to role.
pub const WSA_ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

/// WS-Transfer `Get` action URI.
pub const ACTION_GET: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";

// ============================================================================
// Selectors
// ============================================================================

/// Selector set narrowing a request to one instance of a resource class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorSet(BTreeMap<String, String>);

impl SelectorSet {
    /// Create an empty selector set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a selector.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Look up a selector value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Whether no selectors are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate selectors ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as a `w:SelectorSet` element.
    pub fn to_element(&self) -> Element {
        self.iter().fold(Element::new(NS_WSMAN, "SelectorSet"), |set, (name, value)| {
            set.with_child(Element::leaf(NS_WSMAN, "Selector", value).with_attribute("Name", name))
        })
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a request produced no usable response document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The endpoint returned nothing.
    #[error("empty response")]
    EmptyResponse,

    /// The request could not be delivered.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The response was not a readable XML document.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The response document lacked a field the operation depends on.
    #[error("response is missing {0}")]
    MissingField(String),
}

/// A fault reported by the endpoint itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolFault {
    /// A SOAP `Fault` element, with its reason text.
    #[error("{0}")]
    Soap(String),

    /// `ReturnValue` 2: the request was not acceptable.
    #[error("illegal request")]
    IllegalRequest,

    /// Any other non-zero `ReturnValue`.
    #[error("error ({0})")]
    ReturnValue(u32),
}

impl ProtocolFault {
    /// Numeric code in the style of the invoke return value (SOAP faults are 0).
    pub fn code(&self) -> u32 {
        match self {
            ProtocolFault::Soap(_) => 0,
            ProtocolFault::IllegalRequest => 2,
            ProtocolFault::ReturnValue(code) => *code,
        }
    }
}

/// Classified result of a `get` or `invoke`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request succeeded; carries the response document.
    Success(Element),
    /// The endpoint rejected the request; the response document is kept.
    Fault {
        /// What went wrong
        fault: ProtocolFault,
        /// The full response
        document: Element,
    },
    /// No usable response document.
    Failure(TransportFailure),
}

impl Outcome {
    /// Whether this is [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The response document, if one was received.
    pub fn document(&self) -> Option<&Element> {
        match self {
            Outcome::Success(doc) | Outcome::Fault { document: doc, .. } => Some(doc),
            Outcome::Failure(_) => None,
        }
    }

    /// Convert into a `Result`, dropping the document of a fault.
    pub fn into_result(self) -> crate::Result<Element> {
        match self {
            Outcome::Success(doc) => Ok(doc),
            Outcome::Fault { fault, .. } => Err(fault.into()),
            Outcome::Failure(failure) => Err(failure.into()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(_) => write!(f, "success"),
            Outcome::Fault { fault, .. } => write!(f, "{}", fault),
            Outcome::Failure(failure) => write!(f, "{}", failure),
        }
    }
}
