//! WS-Management transports.
//!
//! A transport delivers one request and hands back the raw response text.
//! Classifying that text (faults, return values) is the client's job, so a
//! transport only fails when nothing usable came back over the wire.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::config::ConnectionConfig;
use super::digest::{is_basic_challenge, DigestChallenge};
use super::xml::Element;
use super::{SelectorSet, ACTION_GET, NS_SOAP, NS_WSA, NS_WSMAN, WSA_ANONYMOUS};

/// SOAP 1.2 content type
const SOAP_CONTENT_TYPE: &str = "application/soap+xml;charset=UTF-8";

/// Errors raised while delivering a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The request could not be sent or the response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The endpoint rejected our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The endpoint answered with a status that carries no SOAP body.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The request envelope could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// The `get`/`invoke` pair the client is built on.
#[async_trait]
pub trait WsManTransport: Send + Sync {
    /// WS-Transfer `Get` of `resource_uri`. Returns the raw response body,
    /// which may be empty.
    async fn get(&self, resource_uri: &str, selectors: &SelectorSet)
        -> Result<String, TransportError>;

    /// Invoke `method` on `resource_uri` with an optional input body.
    async fn invoke(
        &self,
        resource_uri: &str,
        method: &str,
        body: Option<&Element>,
        selectors: &SelectorSet,
    ) -> Result<String, TransportError>;
}

/// How the next request should authenticate.
#[derive(Debug, Clone)]
enum AuthState {
    /// No challenge seen yet
    Unchallenged,
    /// Answer with digest credentials for this challenge
    Digest(DigestChallenge),
    /// Answer with basic credentials
    Basic,
}

/// WS-Management over HTTP(S) with digest or basic authentication.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    path: String,
    username: String,
    password: String,
    operation_timeout: String,
    auth: Mutex<AuthState>,
    nonce_count: AtomicU32,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for the endpoint described by `config`.
    pub fn new(config: &ConnectionConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            path: config.path.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            operation_timeout: format!("PT{}S", config.request_timeout.as_secs().max(1)),
            auth: Mutex::new(AuthState::Unchallenged),
            nonce_count: AtomicU32::new(0),
        })
    }

    /// The endpoint URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Wrap `body` in a SOAP envelope addressed to `resource_uri`.
    pub fn build_envelope(
        &self,
        action: &str,
        resource_uri: &str,
        selectors: &SelectorSet,
        body: Option<&Element>,
    ) -> Element {
        let must_understand = |e: Element| e.with_ns_attribute(NS_SOAP, "mustUnderstand", "true");

        let mut header = Element::new(NS_SOAP, "Header")
            .with_child(Element::leaf(NS_WSA, "To", self.endpoint.as_str()))
            .with_child(must_understand(Element::leaf(
                NS_WSMAN,
                "ResourceURI",
                resource_uri,
            )))
            .with_child(
                Element::new(NS_WSA, "ReplyTo").with_child(must_understand(Element::leaf(
                    NS_WSA,
                    "Address",
                    WSA_ANONYMOUS,
                ))),
            )
            .with_child(must_understand(Element::leaf(NS_WSA, "Action", action)))
            .with_child(Element::leaf(
                NS_WSA,
                "MessageID",
                format!("uuid:{}", Uuid::new_v4()),
            ))
            .with_child(Element::leaf(
                NS_WSMAN,
                "OperationTimeout",
                self.operation_timeout.as_str(),
            ));
        if !selectors.is_empty() {
            header = header.with_child(selectors.to_element());
        }

        let mut soap_body = Element::new(NS_SOAP, "Body");
        if let Some(body) = body {
            soap_body = soap_body.with_child(body.clone());
        }

        Element::new(NS_SOAP, "Envelope")
            .with_child(header)
            .with_child(soap_body)
    }

    /// Attach credentials for the current authentication state.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let state = self.auth.lock().clone();
        match state {
            AuthState::Unchallenged => request,
            AuthState::Basic => request.basic_auth(&self.username, Some(&self.password)),
            AuthState::Digest(challenge) => {
                let nc = self.nonce_count.fetch_add(1, Ordering::SeqCst) + 1;
                let cnonce = Uuid::new_v4().simple().to_string();
                let header = challenge.authorization(
                    &self.username,
                    &self.password,
                    "POST",
                    &self.path,
                    nc,
                    &cnonce,
                );
                request.header(AUTHORIZATION, header)
            }
        }
    }

    /// Record the challenge carried by a 401 response.
    fn accept_challenge(&self, challenges: &[String]) -> Result<(), TransportError> {
        if let Some(challenge) = challenges.iter().find_map(|h| DigestChallenge::parse(h)) {
            debug!(realm = %challenge.realm, "Received digest challenge");
            *self.auth.lock() = AuthState::Digest(challenge);
            self.nonce_count.store(0, Ordering::SeqCst);
            return Ok(());
        }
        if challenges.iter().any(|h| is_basic_challenge(h)) {
            debug!("Received basic challenge");
            *self.auth.lock() = AuthState::Basic;
            return Ok(());
        }
        Err(TransportError::Authentication(
            "no supported authentication challenge".to_string(),
        ))
    }

    /// Post an envelope, answering at most one authentication challenge.
    async fn send(&self, envelope: &Element) -> Result<String, TransportError> {
        let body = envelope
            .to_xml()
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        trace!(endpoint = %self.endpoint, request = %body, "Sending WS-Management request");

        let mut challenged = false;
        loop {
            let request = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
                .body(body.clone());
            let response = self
                .authorize(request)
                .send()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                if challenged {
                    warn!(endpoint = %self.endpoint, "Credentials rejected");
                    return Err(TransportError::Authentication(
                        "credentials rejected".to_string(),
                    ));
                }
                let challenges: Vec<String> = response
                    .headers()
                    .get_all(WWW_AUTHENTICATE)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_string)
                    .collect();
                self.accept_challenge(&challenges)?;
                challenged = true;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?;
            trace!(status = %status, response = %text, "Received WS-Management response");

            // SOAP faults are delivered with 400/500 status codes.
            if status.is_success()
                || status == StatusCode::BAD_REQUEST
                || status == StatusCode::INTERNAL_SERVER_ERROR
            {
                return Ok(text);
            }
            return Err(TransportError::Status(status.as_u16()));
        }
    }
}

#[async_trait]
impl WsManTransport for HttpTransport {
    async fn get(
        &self,
        resource_uri: &str,
        selectors: &SelectorSet,
    ) -> Result<String, TransportError> {
        let envelope = self.build_envelope(ACTION_GET, resource_uri, selectors, None);
        self.send(&envelope).await
    }

    async fn invoke(
        &self,
        resource_uri: &str,
        method: &str,
        body: Option<&Element>,
        selectors: &SelectorSet,
    ) -> Result<String, TransportError> {
        let action = format!("{}/{}", resource_uri, method);
        let envelope = self.build_envelope(&action, resource_uri, selectors, body);
        self.send(&envelope).await
    }
}
