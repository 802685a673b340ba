//! Connection configuration for a WS-Management endpoint.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default AMT WS-Management port
pub const DEFAULT_PORT: u16 = 16992;

/// Default WS-Management endpoint path
pub const DEFAULT_PATH: &str = "/wsman";

/// Idle time after which the host is nudged before the next request
pub const DEFAULT_WAKEUP_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-request HTTP timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport scheme of the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(Error::invalid_host(s, format!("unsupported scheme '{}'", other))),
        }
    }
}

/// Where and how to reach one AMT host.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Endpoint path
    pub path: String,
    /// HTTP or HTTPS
    pub scheme: Scheme,
    /// Username for digest/basic authentication
    pub username: String,
    /// Password for digest/basic authentication
    pub password: String,
    /// Idle time after which a wake-up probe precedes the next request
    pub wakeup_interval: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Accept self-signed or otherwise invalid TLS certificates
    pub accept_invalid_certs: bool,
}

impl ConnectionConfig {
    /// Build a config from a `[scheme://]host[:port]` specification.
    ///
    /// The scheme is split off first, then the port. Missing parts default to
    /// `http` and port 16992.
    pub fn parse(
        spec: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let spec = spec.trim();

        let (scheme, rest) = match spec.split_once("://") {
            Some((scheme, rest)) => (scheme.parse::<Scheme>()?, rest),
            None => (Scheme::Http, spec),
        };

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    Error::invalid_host(spec, format!("invalid port '{}'", port))
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(Error::invalid_host(spec, "empty host"));
        }
        if host.contains('/') {
            return Err(Error::invalid_host(spec, "unexpected path in host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: DEFAULT_PATH.to_string(),
            scheme,
            username: username.into(),
            password: password.into(),
            wakeup_interval: DEFAULT_WAKEUP_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            accept_invalid_certs: false,
        })
    }

    /// Set the wake-up interval
    pub fn with_wakeup_interval(mut self, interval: Duration) -> Self {
        self.wakeup_interval = interval;
        self
    }

    /// Set the HTTP request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Allow invalid TLS certificates
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Full endpoint URL, e.g. `http://10.0.0.5:16992/wsman`.
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("wakeup_interval", &self.wakeup_interval)
            .field("request_timeout", &self.request_timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}
