//! Wire types for the graph database HTTP transactional query protocol.
//!
//! This crate has no I/O. It encodes statement batches, decodes response
//! envelopes, and materializes result fragments into [`RowSet`]s and
//! deduplicated [`Graph`]s.

pub mod codec;
pub mod continuation;
pub mod error;
pub mod graph;
pub mod materialize;
pub mod rowset;
pub mod statement;
pub mod value;

pub use codec::{decode, encode, RequestPayload, ResponseEnvelope, ResultFragment};
pub use continuation::Continuation;
pub use error::{ProtocolError, Result, ServerError};
pub use graph::{Graph, Node, NodeId, Relationship, RelationshipId};
pub use rowset::{Row, RowAccessError, RowCursor, RowSet};
pub use statement::{QueryStats, ResultKind, Statement, StatementResult};
pub use value::{FromValue, Value};
