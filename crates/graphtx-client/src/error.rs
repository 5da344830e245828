//! Caller-facing error taxonomy
//!
//! Every failure is either a local fault (transport, decode, illegal state)
//! or a remote fault (one or more server-reported errors). Callers usually
//! roll back only after a remote fault; after a local fault the transaction
//! is already finalized.

use crate::transaction::{TransactionMode, TransactionState};
use crate::transport::TransportError;
use graphtx_config::ConfigError;
use graphtx_protocol::{ProtocolError, ServerError};
use thiserror::Error;

/// Which side of the wire a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Local,
    Remote,
}

/// Errors surfaced by the client and its transactions
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP exchange failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response could not be decoded
    #[error("protocol decode error: {0}")]
    ProtocolDecode(#[from] ProtocolError),

    /// The operation is not valid in the transaction's current state
    #[error("cannot {operation} a transaction that is {state}: {reason}")]
    IllegalTransactionState {
        operation: &'static str,
        state: TransactionState,
        reason: &'static str,
    },

    /// The operation is not supported by this transaction mode
    #[error("{operation} is not supported by {mode} transactions")]
    UnsupportedOperation {
        operation: &'static str,
        mode: TransactionMode,
    },

    /// The statement already holds a result from an earlier round trip
    #[error("statement has already been executed")]
    StatementAlreadyExecuted,

    /// The server rejected exactly one statement
    #[error("server error {0}")]
    RemoteStatement(ServerError),

    /// The server reported several errors, in the order it listed them
    #[error("server reported {} errors: {}", .0.len(), join_errors(.0))]
    RemoteMulti(Vec<ServerError>),

    /// Client configuration is unusable
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn join_errors(errors: &[ServerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn fault(&self) -> Fault {
        match self {
            Error::RemoteStatement(_) | Error::RemoteMulti(_) => Fault::Remote,
            _ => Fault::Local,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.fault() == Fault::Remote
    }

    /// Server errors carried by a remote fault, empty for local faults
    pub fn server_errors(&self) -> &[ServerError] {
        match self {
            Error::RemoteStatement(error) => std::slice::from_ref(error),
            Error::RemoteMulti(errors) => errors,
            _ => &[],
        }
    }
}

/// Turn the envelope's error list into an outcome.
///
/// One error is surfaced as itself, several are aggregated in order.
pub fn check_server_errors(mut errors: Vec<ServerError>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(Error::RemoteStatement(errors.remove(0))),
        _ => Err(Error::RemoteMulti(errors)),
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
