//! Error types for querybridge
//!
//! Only `OrchestratorError` ever reaches a caller of `answer`. Peer and
//! provider failures are folded into the answer text by the orchestrator.

use std::time::Duration;
use thiserror::Error;

/// Failure talking to the tool peer over an open (or closed) channel.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Not connected to tool peer")]
    NotConnected,

    #[error("Tool peer closed the connection")]
    Closed,

    #[error("Tool peer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tool peer error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Tool peer protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PeerError {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        PeerError::Protocol(msg.into())
    }
}

/// Failure establishing the tool peer channel.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Failed to spawn tool peer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool peer handshake failed: {0}")]
    Handshake(#[source] PeerError),

    #[error("Tool peer handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a single model invocation. Never retried.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Create a decoding error
    pub fn decode(msg: impl Into<String>) -> Self {
        ProviderError::Decode(msg.into())
    }
}

/// Hard failures of `Orchestrator::answer`.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Not connected to tool peer")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = PeerError::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert_eq!(err.to_string(), "Tool peer error -32601: Method not found");
    }

    #[test]
    fn test_handshake_error_keeps_source() {
        let err = ConnectError::Handshake(PeerError::Closed);
        assert!(err.to_string().contains("closed the connection"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
