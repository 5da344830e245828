//! Async driver for the graph database HTTP transactional query protocol
//!
//! Statements are queued on a [`Transaction`] and sent in round trips over a
//! [`Transport`]. Results land in each [`Statement`]'s write-once slot as a
//! [`RowSet`] or a deduplicated [`Graph`].
//!
//! Two transaction modes are available:
//! - **atomic**: one round trip that begins and commits ([`GraphClient::atomic`])
//! - **long-running**: explicit begin, flushes that keep the transaction open,
//!   then commit or rollback; bound to a caller context through the
//!   [`TransactionRegistry`] ([`GraphClient::long_running`], [`GraphClient::scope`],
//!   [`GraphClient::in_transaction`])

pub mod client;
pub mod endpoints;
pub mod error;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transaction;
pub mod transport;

pub use client::GraphClient;
pub use endpoints::Endpoints;
pub use error::{check_server_errors, Error, Fault, Result};
pub use registry::{ContextKey, RegistryBinding, SharedTransaction, TransactionRegistry, TransactionScope};
pub use transaction::{Transaction, TransactionId, TransactionMode, TransactionState};
pub use transport::{HttpTransport, Transport, TransportError};

pub use graphtx_config::{ClientConfig, Credentials};
pub use graphtx_protocol::{
    Graph, Node, QueryStats, Relationship, ResultKind, Row, RowAccessError, RowCursor, RowSet,
    ServerError, Statement, StatementResult, Value,
};
