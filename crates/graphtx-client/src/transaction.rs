//! The transaction state machine.
//!
//! A transaction queues statements and sends them in round trips. Each round
//! trip encodes the queue, posts it, decodes the envelope, checks server
//! errors, and only then fills each statement's result slot in add order.
//!
//! ```text
//!   OPEN --flush--> FLUSHED --flush--> FLUSHED
//!     |                |
//!     +----commit------+---> COMMITTED
//!     +----rollback----+---> ROLLED_BACK
//!     +--local fault---+---> FAILED
//! ```

use crate::endpoints::Endpoints;
use crate::error::{check_server_errors, Error, Result};
use crate::registry::RegistryBinding;
use crate::transport::Transport;
use chrono::{DateTime, FixedOffset};
use graphtx_protocol::{
    decode, encode, Continuation, ProtocolError, RequestPayload, ResponseEnvelope, Statement,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Client-side identity of a transaction, used in logs and registry bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    /// One round trip that begins and commits; never registered
    Atomic,
    /// Explicit begin, any number of flushes, then commit or rollback
    LongRunning,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::Atomic => f.write_str("atomic"),
            TransactionMode::LongRunning => f.write_str("long-running"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Open,
    Flushed,
    Committed,
    RolledBack,
    Failed,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Failed
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Open => "open",
            TransactionState::Flushed => "flushed",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
            TransactionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A transaction against the HTTP endpoint.
///
/// Local faults (transport, decode, illegal state) move the transaction to
/// [`TransactionState::Failed`]. Remote faults leave the state alone so the
/// caller can still roll back.
pub struct Transaction {
    id: TransactionId,
    mode: TransactionMode,
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    continuation: Option<Continuation>,
    queue: Vec<Arc<Statement>>,
    state: TransactionState,
    begun: bool,
    binding: Option<RegistryBinding>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("endpoint", &self.endpoint())
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn atomic(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self::with_mode(TransactionId::new(), TransactionMode::Atomic, transport, endpoints, None)
    }

    pub(crate) fn long_running(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        binding: Option<RegistryBinding>,
    ) -> Self {
        let id = binding
            .as_ref()
            .map(RegistryBinding::id)
            .unwrap_or_default();
        Self::with_mode(id, TransactionMode::LongRunning, transport, endpoints, binding)
    }

    fn with_mode(
        id: TransactionId,
        mode: TransactionMode,
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        binding: Option<RegistryBinding>,
    ) -> Self {
        Self {
            id,
            mode,
            transport,
            endpoints,
            continuation: None,
            queue: Vec::new(),
            state: TransactionState::Open,
            begun: false,
            binding,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn is_begun(&self) -> bool {
        self.begun
    }

    /// Statements queued and not yet sent
    pub fn pending(&self) -> &[Arc<Statement>] {
        &self.queue
    }

    /// Current continuation, once a round trip has opened the transaction server-side
    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }

    /// Server-side expiry of the open transaction
    pub fn expiry(&self) -> Option<DateTime<FixedOffset>> {
        self.continuation.as_ref().map(Continuation::expires)
    }

    /// Endpoint the next round trip is sent to
    pub fn endpoint(&self) -> &str {
        match (&self.continuation, self.mode) {
            (Some(continuation), _) => continuation.endpoint(),
            (None, TransactionMode::Atomic) => self.endpoints.autocommit(),
            (None, TransactionMode::LongRunning) => self.endpoints.transaction(),
        }
    }

    /// Mark a long-running transaction as started.
    ///
    /// No request is sent; the server-side transaction opens on the first flush.
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_active("begin")?;
        self.ensure_supported("begin", TransactionMode::LongRunning)?;
        if self.begun {
            return Err(self.illegal("begin", "transaction has already begun"));
        }
        self.begun = true;
        debug!(tx = %self.id, "Transaction begun");
        Ok(())
    }

    /// Queue a statement for the next round trip.
    ///
    /// Returns the shared handle the result will be read from.
    pub fn add(&mut self, statement: impl Into<Arc<Statement>>) -> Result<Arc<Statement>> {
        self.ensure_active("add")?;
        if self.mode == TransactionMode::LongRunning && !self.begun {
            return Err(self.illegal("add", "begin must be called before add"));
        }

        let statement = statement.into();
        if statement.is_resolved() || self.queue.iter().any(|q| Arc::ptr_eq(q, &statement)) {
            return Err(Error::StatementAlreadyExecuted);
        }

        self.queue.push(Arc::clone(&statement));
        Ok(statement)
    }

    /// Send the queued statements and keep the transaction open.
    #[instrument(skip(self), fields(tx = %self.id, pending = self.queue.len()))]
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_active("flush")?;
        self.ensure_supported("flush", TransactionMode::LongRunning)?;
        if !self.begun {
            return Err(self.illegal("flush", "begin must be called before flush"));
        }
        self.ensure_queue_unexecuted()?;

        let url = self.endpoint().to_string();
        let payload = self.encode_queue()?;
        let envelope = self.exchange(&url, &payload).await?;

        let continuation = self.adopt_continuation(&envelope)?;
        self.resolve_queue(&envelope)?;

        debug!(
            endpoint = continuation.endpoint(),
            expires = %continuation.expires(),
            "Rotated transaction endpoint"
        );
        self.continuation = Some(continuation);
        self.queue.clear();
        self.state = TransactionState::Flushed;
        Ok(())
    }

    /// Send any queued statements and commit.
    ///
    /// The registry binding is released whatever the outcome.
    #[instrument(skip(self), fields(tx = %self.id, mode = %self.mode, pending = self.queue.len()))]
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_active("commit")?;
        if self.mode == TransactionMode::LongRunning && !self.begun {
            return Err(self.illegal("commit", "begin must be called before commit"));
        }
        self.ensure_queue_unexecuted()?;

        let url = match &self.continuation {
            Some(continuation) => continuation.commit_url(),
            None => self.endpoints.autocommit().to_string(),
        };
        let payload = self.encode_queue()?;

        let outcome = match self.exchange(&url, &payload).await {
            Ok(envelope) => self.resolve_queue(&envelope),
            Err(err) => Err(err),
        };

        // local faults have already failed the transaction
        match outcome {
            Ok(()) => {
                info!("Transaction committed");
                self.queue.clear();
                self.state = TransactionState::Committed;
                self.release();
                Ok(())
            }
            Err(err) if err.is_remote() && self.mode == TransactionMode::LongRunning => {
                self.release();
                Err(err)
            }
            Err(err) if err.is_remote() => Err(self.fail(err)),
            Err(err) => Err(err),
        }
    }

    /// Abort the transaction and discard queued statements.
    ///
    /// Before any round trip nothing exists server-side and no request is sent.
    /// A server error in the rollback response still leaves the transaction
    /// rolled back, and the error is returned.
    #[instrument(skip(self), fields(tx = %self.id, mode = %self.mode))]
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_active("rollback")?;

        let Some(continuation) = self.continuation.as_ref() else {
            self.finish_rollback();
            return Ok(());
        };

        let url = continuation.endpoint().to_string();
        let body = match self.transport.delete(&url).await {
            Ok(body) => body,
            Err(err) => return Err(self.fail(err.into())),
        };
        let mut envelope = match decode(&body) {
            Ok(envelope) => envelope,
            Err(err) => return Err(self.fail(err.into())),
        };

        self.finish_rollback();
        check_server_errors(envelope.take_errors())
    }

    /// Extend the server-side lifetime by posting an empty batch.
    ///
    /// Queued statements are not sent. A no-op until the transaction has been
    /// opened server-side by a flush.
    #[instrument(skip(self), fields(tx = %self.id))]
    pub async fn keep_alive(&mut self) -> Result<()> {
        self.ensure_active("keep_alive")?;
        self.ensure_supported("keep_alive", TransactionMode::LongRunning)?;

        let Some(continuation) = self.continuation.as_ref() else {
            debug!("Nothing open server-side yet, skipping keep-alive");
            return Ok(());
        };

        let url = continuation.endpoint().to_string();
        let payload = match RequestPayload::empty().to_json() {
            Ok(payload) => payload,
            Err(err) => return Err(self.fail(err.into())),
        };
        let envelope = self.exchange(&url, &payload).await?;
        let continuation = self.adopt_continuation(&envelope)?;

        debug!(expires = %continuation.expires(), "Extended transaction expiry");
        self.continuation = Some(continuation);
        Ok(())
    }

    fn encode_queue(&mut self) -> Result<serde_json::Value> {
        let encoded = encode(self.queue.iter().map(|statement| &**statement)).to_json();
        encoded.map_err(|err| self.fail(err.into()))
    }

    /// One POST: send, decode, check server errors.
    ///
    /// Local faults fail the transaction; remote faults are returned as is.
    async fn exchange(
        &mut self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<ResponseEnvelope> {
        let statements = payload
            .get("statements")
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len);
        info!(statements, url, "Sending batch");
        debug!(payload = %payload, "Request payload");

        let body = match self.transport.post(url, payload).await {
            Ok(body) => body,
            Err(err) => return Err(self.fail(err.into())),
        };
        debug!(body = %body, "Response body");

        let mut envelope = match decode(&body) {
            Ok(envelope) => envelope,
            Err(err) => return Err(self.fail(err.into())),
        };

        if let Err(err) = check_server_errors(envelope.take_errors()) {
            warn!(tx = %self.id, error = %err, "Server rejected batch");
            return Err(err);
        }
        Ok(envelope)
    }

    fn adopt_continuation(&mut self, envelope: &ResponseEnvelope) -> Result<Continuation> {
        match envelope.continuation() {
            Ok(Some(continuation)) => Ok(continuation),
            Ok(None) => Err(self.fail(ProtocolError::MissingContinuation.into())),
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Fill every queued statement's slot from its positional fragment.
    ///
    /// All fragments are located first so a short response resolves nothing.
    fn resolve_queue(&mut self, envelope: &ResponseEnvelope) -> Result<()> {
        let fragments: std::result::Result<Vec<_>, _> =
            (0..self.queue.len()).map(|i| envelope.fragment(i)).collect();

        let outcome = fragments.and_then(|fragments| {
            self.queue
                .iter()
                .zip(fragments)
                .try_for_each(|(statement, fragment)| statement.resolve(fragment))
        });

        outcome.map_err(|err| self.fail(err.into()))
    }

    fn finish_rollback(&mut self) {
        info!(discarded = self.queue.len(), "Transaction rolled back");
        self.queue.clear();
        self.state = TransactionState::RolledBack;
        self.release();
    }

    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::IllegalTransactionState {
                operation,
                state: self.state,
                reason: "transaction is finalized",
            });
        }
        Ok(())
    }

    /// A queued statement may have been executed by another transaction since it was added
    fn ensure_queue_unexecuted(&self) -> Result<()> {
        if self.queue.iter().any(|statement| statement.is_resolved()) {
            return Err(Error::StatementAlreadyExecuted);
        }
        Ok(())
    }

    fn ensure_supported(&self, operation: &'static str, required: TransactionMode) -> Result<()> {
        if self.mode != required {
            return Err(Error::UnsupportedOperation {
                operation,
                mode: self.mode,
            });
        }
        Ok(())
    }

    /// Misuse of an active transaction finalizes it
    fn illegal(&mut self, operation: &'static str, reason: &'static str) -> Error {
        let err = Error::IllegalTransactionState {
            operation,
            state: self.state,
            reason,
        };
        self.fail(err)
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(tx = %self.id, state = %self.state, error = %err, "Transaction failed");
        self.state = TransactionState::Failed;
        self.queue.clear();
        self.release();
        err
    }

    fn release(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.release();
        }
    }
}
