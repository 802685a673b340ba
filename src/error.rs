//! Error types for amtctl.
//!
//! Configuration problems are detected before any request is sent. Transport
//! failures and protocol faults come back from the WS-Management client and
//! abort the operation that triggered them. A wait that runs out of time is not
//! an error; see [`crate::amt::SetOutcome::TimedOut`].

use thiserror::Error;

use crate::wsman::{ProtocolFault, TransportFailure};

/// Result type alias for amtctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for amtctl.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The host specification could not be parsed.
    #[error("invalid host '{spec}': {reason}")]
    InvalidHost {
        /// The offending `[scheme://]host[:port]` string
        spec: String,
        /// Why it was rejected
        reason: String,
    },

    /// The requested power state is not one of the settable states.
    #[error("invalid state ({0})")]
    InvalidPowerState(String),

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A named host profile does not exist in the configuration.
    #[error("unknown host profile '{0}'")]
    UnknownProfile(String),

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The request never produced a usable response.
    #[error("transport failure: {0}")]
    Transport(TransportFailure),

    /// The endpoint answered with a SOAP fault or a non-zero return value.
    #[error("protocol fault: {0}")]
    Fault(ProtocolFault),

    /// Waiting for a state change was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for an [`Error::InvalidHost`].
    pub fn invalid_host(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidHost {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised locally before talking to the host.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidHost { .. }
                | Error::InvalidPowerState(_)
                | Error::Config(_)
                | Error::UnknownProfile(_)
        )
    }
}

impl From<TransportFailure> for Error {
    fn from(failure: TransportFailure) -> Self {
        Error::Transport(failure)
    }
}

impl From<ProtocolFault> for Error {
    fn from(fault: ProtocolFault) -> Self {
        Error::Fault(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_host("http://", "empty host");
        assert_eq!(err.to_string(), "invalid host 'http://': empty host");

        let err = Error::InvalidPowerState("sleep".to_string());
        assert_eq!(err.to_string(), "invalid state (sleep)");

        let err = Error::Fault(ProtocolFault::IllegalRequest);
        assert_eq!(err.to_string(), "protocol fault: illegal request");

        let err = Error::Transport(TransportFailure::EmptyResponse);
        assert_eq!(err.to_string(), "transport failure: empty response");
    }

    #[test]
    fn test_configuration_classification() {
        assert!(Error::InvalidPowerState("x".into()).is_configuration());
        assert!(Error::UnknownProfile("lab".into()).is_configuration());
        assert!(!Error::Cancelled.is_configuration());
        assert!(!Error::Fault(ProtocolFault::ReturnValue(1)).is_configuration());
    }
}
