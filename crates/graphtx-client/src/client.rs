//! Entry point: builds transactions against one server.

use crate::endpoints::Endpoints;
use crate::error::Result;
use crate::registry::{
    ContextKey, RegistryBinding, SharedTransaction, TransactionRegistry, TransactionScope,
};
use crate::transaction::Transaction;
use crate::transport::{HttpTransport, Transport};
use futures::future::BoxFuture;
use graphtx_config::ClientConfig;
use graphtx_protocol::Statement;
use std::sync::Arc;
use tracing::{debug, warn};

/// Client for the HTTP transactional endpoint.
///
/// Cheap to clone; clones share the transport and the transaction registry.
///
/// # Example
/// ```no_run
/// # use graphtx_client::{GraphClient, Statement};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GraphClient::with_credentials("http://localhost:7474/db/data", "neo4j", "secret")?;
///
/// let mut tx = client.atomic();
/// let one = tx.add(Statement::row("RETURN 1"))?;
/// tx.commit().await?;
///
/// let rows = one.row_set().expect("committed");
/// assert_eq!(rows.row(0).unwrap().int(0)?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GraphClient {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    registry: TransactionRegistry,
}

impl GraphClient {
    /// Client without authentication
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&ClientConfig::builder().base_url(base_url).build())
    }

    /// Client applying basic auth to every request
    pub fn with_credentials(base_url: &str, username: &str, password: &str) -> Result<Self> {
        Self::from_config(
            &ClientConfig::builder()
                .base_url(base_url)
                .credentials(username, password)
                .build(),
        )
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(config)?;
        debug!(base_url = %config.base_url, "Created graph client");
        Ok(Self::with_transport(&config.base_url, Arc::new(transport)))
    }

    /// Client over a custom transport
    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            endpoints: Endpoints::new(base_url),
            registry: TransactionRegistry::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.endpoints.base()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// A fresh single-use transaction; never registered
    pub fn atomic(&self) -> Transaction {
        Transaction::atomic(Arc::clone(&self.transport), self.endpoints.clone())
    }

    /// The long-running transaction bound to `context`, created if absent or finalized
    pub fn long_running(&self, context: &ContextKey) -> SharedTransaction {
        self.registry
            .get_or_create(context, |binding| self.new_long_running(Some(binding)))
    }

    /// A long-running transaction outside the registry
    pub fn detached(&self) -> Transaction {
        self.new_long_running(None)
    }

    /// Acquire the context's transaction until the scope is dropped
    pub fn scope(&self, context: impl Into<ContextKey>) -> TransactionScope {
        self.registry
            .scope(context.into(), |binding| self.new_long_running(Some(binding)))
    }

    /// Unbind whatever transaction is bound to `context`
    pub fn release(&self, context: &ContextKey) -> bool {
        self.registry.release(context)
    }

    fn new_long_running(&self, binding: Option<RegistryBinding>) -> Transaction {
        Transaction::long_running(Arc::clone(&self.transport), self.endpoints.clone(), binding)
    }

    /// Run one statement in an atomic transaction and return it resolved
    pub async fn execute(&self, statement: Statement) -> Result<Arc<Statement>> {
        let mut tx = self.atomic();
        let statement = tx.add(statement)?;
        tx.commit().await?;
        Ok(statement)
    }

    /// Run `work` inside the context's long-running transaction.
    ///
    /// Begins the transaction if needed, commits when `work` succeeds and
    /// rolls back (best effort) when `work` fails or the server rejects the
    /// commit. The binding is released on every path. A context must not be shared by concurrent tasks.
    ///
    /// ```no_run
    /// # use graphtx_client::{GraphClient, Statement};
    /// # async fn example(client: GraphClient) -> graphtx_client::Result<()> {
    /// let created = client
    ///     .in_transaction("import", |tx| {
    ///         Box::pin(async move {
    ///             tx.add(Statement::row("CREATE (n:Person {name: $name})").with_param("name", "Ada"))?;
    ///             tx.flush().await?;
    ///             let count = tx.add(Statement::row("MATCH (n:Person) RETURN count(n)"))?;
    ///             Ok(count)
    ///         })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn in_transaction<T, F>(&self, context: impl Into<ContextKey>, work: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let scope = self.scope(context);
        let mut tx = scope.lock().await;
        if !tx.is_begun() {
            tx.begin()?;
        }

        match work(&mut *tx).await {
            Ok(value) => {
                if tx.is_active() {
                    if let Err(err) = tx.commit().await {
                        // a remote commit fault leaves the server transaction open
                        if err.is_remote() {
                            roll_back_quietly(&mut tx, scope.key()).await;
                        }
                        return Err(err);
                    }
                }
                Ok(value)
            }
            Err(err) => {
                roll_back_quietly(&mut tx, scope.key()).await;
                Err(err)
            }
        }
    }
}

/// Best-effort rollback of a still-active transaction; failures are only logged
async fn roll_back_quietly(tx: &mut Transaction, context: &ContextKey) {
    if !tx.is_active() {
        return;
    }
    if let Err(err) = tx.rollback().await {
        warn!(
            context = %context,
            error = %err,
            "Rollback after failed work did not complete"
        );
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.endpoints.base())
            .field("bound_transactions", &self.registry.len())
            .finish()
    }
}
