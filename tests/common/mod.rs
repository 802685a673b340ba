//! Shared test utilities for the amtctl test suite.
//!
//! This module provides:
//! - A scripted [`MockTransport`] that records every request it receives
//! - A [`CountingProbe`] standing in for the ping-based wake-up probe
//! - Builders for AMT response documents
//! - An observer that collects [`PowerEvent`]s
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use amtctl::amt::{
    AmtPower, PowerEvent, PowerObserver, CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE,
    CIM_POWER_MANAGEMENT_SERVICE,
};
use amtctl::wsman::{
    ConnectionConfig, Element, SelectorSet, TransportError, WakeProbe, WsManClient, WsManTransport,
    NS_SOAP,
};

// ============================================================================
// Response Builders
// ============================================================================

/// `get` response reporting `code` as the power state
pub fn power_state_response(code: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="{NS_SOAP}" xmlns:p="{CIM_ASSOCIATED_POWER_MANAGEMENT_SERVICE}">
  <s:Header/>
  <s:Body>
    <p:CIM_AssociatedPowerManagementService>
      <p:PowerState>{code}</p:PowerState>
      <p:RequestedPowerState>{code}</p:RequestedPowerState>
    </p:CIM_AssociatedPowerManagementService>
  </s:Body>
</s:Envelope>"#
    )
}

/// `invoke` response carrying `return_value`
pub fn invoke_response(return_value: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="{NS_SOAP}" xmlns:g="{CIM_POWER_MANAGEMENT_SERVICE}">
  <s:Header/>
  <s:Body>
    <g:RequestPowerStateChange_OUTPUT>
      <g:ReturnValue>{return_value}</g:ReturnValue>
    </g:RequestPowerStateChange_OUTPUT>
  </s:Body>
</s:Envelope>"#
    )
}

/// SOAP fault whose reason is `reason`
pub fn fault_response(reason: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="{NS_SOAP}">
  <s:Body>
    <s:Fault>
      <s:Code><s:Value>s:Sender</s:Value></s:Code>
      <s:Reason><s:Text>{reason}</s:Text></s:Reason>
    </s:Fault>
  </s:Body>
</s:Envelope>"#
    )
}

// ============================================================================
// Mock Transport
// ============================================================================

/// A request received by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get {
        resource_uri: String,
    },
    Invoke {
        resource_uri: String,
        method: String,
        body: Option<Element>,
        selectors: SelectorSet,
    },
}

#[derive(Default)]
struct MockState {
    gets: VecDeque<Result<String, TransportError>>,
    invokes: VecDeque<Result<String, TransportError>>,
    repeat_get: Option<String>,
    requests: Vec<Request>,
}

/// Transport answering from scripted queues.
///
/// Clones share state so a test can keep a handle after moving one into a
/// client. An exhausted `get` queue falls back to the repeated response, if
/// set, and then to an empty body.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `get` response
    pub fn push_get(&self, response: impl Into<String>) -> &Self {
        self.state.lock().gets.push_back(Ok(response.into()));
        self
    }

    /// Queue a `get` transport error
    pub fn push_get_error(&self, error: TransportError) -> &Self {
        self.state.lock().gets.push_back(Err(error));
        self
    }

    /// Answer every unscripted `get` with `response`
    pub fn repeat_get(&self, response: impl Into<String>) -> &Self {
        self.state.lock().repeat_get = Some(response.into());
        self
    }

    /// Queue an `invoke` response
    pub fn push_invoke(&self, response: impl Into<String>) -> &Self {
        self.state.lock().invokes.push_back(Ok(response.into()));
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Number of `get` requests received
    pub fn get_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, Request::Get { .. }))
            .count()
    }

    /// The last `invoke` received
    pub fn last_invoke(&self) -> Option<Request> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| matches!(r, Request::Invoke { .. }))
    }
}

#[async_trait]
impl WsManTransport for MockTransport {
    async fn get(
        &self,
        resource_uri: &str,
        _selectors: &SelectorSet,
    ) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(Request::Get {
            resource_uri: resource_uri.to_string(),
        });
        match state.gets.pop_front() {
            Some(response) => response,
            None => Ok(state.repeat_get.clone().unwrap_or_default()),
        }
    }

    async fn invoke(
        &self,
        resource_uri: &str,
        method: &str,
        body: Option<&Element>,
        selectors: &SelectorSet,
    ) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(Request::Invoke {
            resource_uri: resource_uri.to_string(),
            method: method.to_string(),
            body: body.cloned(),
            selectors: selectors.clone(),
        });
        state.invokes.pop_front().unwrap_or_else(|| Ok(String::new()))
    }
}

// ============================================================================
// Wake Probe
// ============================================================================

/// Probe that only counts how often it ran
#[derive(Clone, Default)]
pub struct CountingProbe {
    count: Arc<AtomicU32>,
}

impl CountingProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WakeProbe for CountingProbe {
    async fn probe(&self, _host: &str) -> bool {
        self.count.fetch_add(1, Ordering::SeqCst);
        // The outcome must not matter to callers.
        false
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Observer that keeps every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PowerEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<PowerEvent> {
        self.events.lock().clone()
    }
}

impl PowerObserver for RecordingObserver {
    fn on_event(&self, event: &PowerEvent) {
        self.events.lock().push(event.clone());
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::parse("10.0.0.5", "admin", "secret").expect("valid host spec")
}

/// A client over a mock transport, plus handles to inspect it
pub fn mock_client() -> (WsManClient, MockTransport, CountingProbe) {
    let transport = MockTransport::new();
    let probe = CountingProbe::new();
    let client = WsManClient::with_transport(test_config(), transport.clone(), probe.clone());
    (client, transport, probe)
}

/// A controller over a mock transport, plus handles to inspect it
pub fn mock_power() -> (AmtPower, MockTransport, CountingProbe) {
    let (client, transport, probe) = mock_client();
    (AmtPower::from_client(client), transport, probe)
}
