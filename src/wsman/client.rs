//! WS-Management client: one session with one host.
//!
//! [`WsManClient`] issues single-shot `get`/`invoke` requests through a
//! [`WsManTransport`], classifies each response into an [`Outcome`] and records
//! when the host was last contacted so idle hosts can be woken first.

use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::ConnectionConfig;
use super::transport::{HttpTransport, TransportError, WsManTransport};
use super::wake::{needs_wake, PingProbe, WakeProbe};
use super::xml::Element;
use super::{Outcome, ProtocolFault, SelectorSet, TransportFailure, NS_SOAP};
use crate::error::{Error, Result};

/// `ReturnValue` reported for a request the endpoint considers illegal
const RETURN_ILLEGAL_REQUEST: u32 = 2;

/// A session with one AMT host.
///
/// The client is owned by exactly one controller and is never shared, so the
/// last-contact bookkeeping needs no locking.
pub struct WsManClient {
    config: ConnectionConfig,
    transport: Box<dyn WsManTransport>,
    probe: Box<dyn WakeProbe>,
    last_contact: Option<Instant>,
}

impl std::fmt::Debug for WsManClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsManClient")
            .field("config", &self.config)
            .field("last_contact", &self.last_contact)
            .finish_non_exhaustive()
    }
}

impl WsManClient {
    /// Create a client speaking HTTP(S) and waking hosts with `ping`.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self::with_transport(config, transport, PingProbe::new()))
    }

    /// Create a client with a custom transport and wake probe.
    pub fn with_transport(
        config: ConnectionConfig,
        transport: impl WsManTransport + 'static,
        probe: impl WakeProbe + 'static,
    ) -> Self {
        Self {
            config,
            transport: Box::new(transport),
            probe: Box::new(probe),
            last_contact: None,
        }
    }

    /// The connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// When the host was last contacted, if ever.
    pub fn last_contact(&self) -> Option<Instant> {
        self.last_contact
    }

    /// Probe the host if it has been idle longer than the wake-up interval.
    ///
    /// The probe's result never affects the caller; `last_contact` is reset
    /// whenever a probe was attempted. Returns whether a probe was issued.
    pub async fn wake_up(&mut self) -> bool {
        let now = Instant::now();
        if !needs_wake(self.last_contact, now, self.config.wakeup_interval) {
            return false;
        }

        debug!(host = %self.config.host, "Host idle, sending wake-up probe");
        let reachable = self.probe.probe(&self.config.host).await;
        debug!(host = %self.config.host, reachable, "Wake-up probe done");
        self.last_contact = Some(now);
        true
    }

    /// WS-Transfer `Get` of `resource_uri`.
    pub async fn get(&mut self, resource_uri: &str) -> Outcome {
        debug!(host = %self.config.host, resource_uri, "WS-Management get");
        let raw = self.transport.get(resource_uri, &SelectorSet::new()).await;
        self.last_contact = Some(Instant::now());

        let outcome = classify_get(raw);
        log_outcome("get", resource_uri, &outcome);
        outcome
    }

    /// Invoke `method` on `resource_uri`.
    pub async fn invoke(
        &mut self,
        resource_uri: &str,
        method: &str,
        body: Option<&Element>,
        selectors: &SelectorSet,
    ) -> Outcome {
        debug!(host = %self.config.host, resource_uri, method, "WS-Management invoke");
        let raw = self
            .transport
            .invoke(resource_uri, method, body, selectors)
            .await;
        self.last_contact = Some(Instant::now());

        let outcome = classify_invoke(raw, resource_uri);
        log_outcome(method, resource_uri, &outcome);
        outcome
    }
}

fn log_outcome(operation: &str, resource_uri: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Success(_) => debug!(operation, resource_uri, "Request succeeded"),
        Outcome::Fault { fault, .. } => {
            warn!(operation, resource_uri, fault = %fault, "Request faulted")
        }
        Outcome::Failure(failure) => {
            warn!(operation, resource_uri, failure = %failure, "Request failed")
        }
    }
}

/// Turn a raw transport result into a document.
fn parse_response(
    raw: std::result::Result<String, TransportError>,
) -> std::result::Result<Element, TransportFailure> {
    let text = raw.map_err(|e| TransportFailure::Unreachable(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(TransportFailure::EmptyResponse);
    }
    Element::parse(&text).map_err(|e| TransportFailure::Malformed(e.to_string()))
}

/// The SOAP fault carried by `document`, if any.
fn soap_fault(document: &Element) -> Option<ProtocolFault> {
    let fault = document.find_first(NS_SOAP, "Fault")?;

    let reason = fault
        .child(NS_SOAP, "Reason")
        .and_then(|reason| reason.find_first(NS_SOAP, "Text"))
        .and_then(Element::text)
        .map(str::to_string);
    let message = reason
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| fault.text_content());

    Some(ProtocolFault::Soap(if message.is_empty() {
        "unknown fault".to_string()
    } else {
        message
    }))
}

/// Classify the response to a `get`.
pub(crate) fn classify_get(raw: std::result::Result<String, TransportError>) -> Outcome {
    let document = match parse_response(raw) {
        Ok(document) => document,
        Err(failure) => return Outcome::Failure(failure),
    };

    match soap_fault(&document) {
        Some(fault) => Outcome::Fault { fault, document },
        None => Outcome::Success(document),
    }
}

/// Classify the response to an `invoke` of a method on `resource_uri`.
pub(crate) fn classify_invoke(
    raw: std::result::Result<String, TransportError>,
    resource_uri: &str,
) -> Outcome {
    let document = match parse_response(raw) {
        Ok(document) => document,
        Err(failure) => return Outcome::Failure(failure),
    };

    if let Some(fault) = soap_fault(&document) {
        return Outcome::Fault { fault, document };
    }

    let Some(text) = document
        .find_first(resource_uri, "ReturnValue")
        .and_then(Element::text)
        .map(str::to_string)
    else {
        return Outcome::Failure(TransportFailure::MissingField("ReturnValue".to_string()));
    };

    match text.parse::<u32>() {
        Ok(0) => Outcome::Success(document),
        Ok(RETURN_ILLEGAL_REQUEST) => Outcome::Fault {
            fault: ProtocolFault::IllegalRequest,
            document,
        },
        Ok(code) => Outcome::Fault {
            fault: ProtocolFault::ReturnValue(code),
            document,
        },
        Err(_) => {
            warn!(resource_uri, value = %text, "Non-integer ReturnValue");
            Outcome::Failure(TransportFailure::MissingField("ReturnValue".to_string()))
        }
    }
}
