//! Error types for the wire codec and result materialization

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error reported by the server inside a well-formed envelope.
///
/// This is a remote fault: the request reached the server and was rejected there.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ServerError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while encoding a request or decoding a response envelope
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The response body is not a valid transaction envelope
    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The request payload could not be serialized
    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// Fewer result fragments came back than statements were sent
    #[error("response has no result fragment for statement {index} ({available} fragments returned)")]
    MissingFragment { index: usize, available: usize },

    /// A round trip that must keep the transaction open returned no continuation
    #[error("response is missing the transaction continuation endpoint")]
    MissingContinuation,

    /// The envelope carries a `commit` endpoint but no transaction expiry
    #[error("response has a continuation endpoint but no transaction expiry")]
    MissingExpiry,

    /// The server-reported expiry could not be parsed
    #[error("invalid transaction expiry '{raw}': {source}")]
    InvalidExpiry {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A statement's result slot was already filled by an earlier round trip
    #[error("statement result has already been set")]
    ResultAlreadySet,
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
