//! At most one live long-running transaction per caller context.

use crate::transaction::{Transaction, TransactionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// A long-running transaction shared between the registry and its caller
pub type SharedTransaction = Arc<Mutex<Transaction>>;

/// Caller-chosen key identifying a logical context (a request, a session, a task)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(Arc<str>);

impl ContextKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// A fresh key that collides with nothing
    pub fn unique() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ContextKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl From<&ContextKey> for ContextKey {
    fn from(key: &ContextKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Binding {
    id: TransactionId,
    transaction: SharedTransaction,
}

type BindingTable = DashMap<ContextKey, Binding>;

/// Unbinds only the transaction it was created for, so a stale holder can
/// never evict a newer binding under the same key.
fn unbind(table: &BindingTable, key: &ContextKey, id: TransactionId) -> bool {
    table.remove_if(key, |_, binding| binding.id == id).is_some()
}

/// Handle a transaction keeps to remove itself from the registry when it
/// reaches a terminal state.
pub struct RegistryBinding {
    table: Weak<BindingTable>,
    key: ContextKey,
    id: TransactionId,
}

impl RegistryBinding {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    pub fn release(self) {
        if let Some(table) = self.table.upgrade() {
            if unbind(&table, &self.key, self.id) {
                debug!(context = %self.key, tx = %self.id, "Released transaction binding");
            }
        }
    }
}

impl fmt::Debug for RegistryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBinding")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

/// Binding table from context keys to live long-running transactions.
///
/// Cloning shares the same table.
#[derive(Clone, Default)]
pub struct TransactionRegistry {
    bindings: Arc<BindingTable>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live transaction bound to `key`, or bind a new one built by
    /// `create`. Atomic per key: concurrent callers get the same transaction.
    ///
    /// A binding whose transaction is finalized is replaced. One that is
    /// locked by its user counts as live.
    pub fn get_or_create<F>(&self, key: &ContextKey, create: F) -> SharedTransaction
    where
        F: FnOnce(RegistryBinding) -> Transaction,
    {
        self.acquire(key, create).1
    }

    fn acquire<F>(&self, key: &ContextKey, create: F) -> (TransactionId, SharedTransaction)
    where
        F: FnOnce(RegistryBinding) -> Transaction,
    {
        match self.bindings.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if is_live(&current.transaction) {
                    return (current.id, Arc::clone(&current.transaction));
                }
                debug!(context = %key, "Replacing finalized transaction binding");
                let binding = self.bind(key, create);
                let acquired = (binding.id, Arc::clone(&binding.transaction));
                occupied.insert(binding);
                acquired
            }
            Entry::Vacant(vacant) => {
                let binding = self.bind(key, create);
                let acquired = (binding.id, Arc::clone(&binding.transaction));
                vacant.insert(binding);
                acquired
            }
        }
    }

    fn bind<F>(&self, key: &ContextKey, create: F) -> Binding
    where
        F: FnOnce(RegistryBinding) -> Transaction,
    {
        let id = TransactionId::new();
        let handle = RegistryBinding {
            table: Arc::downgrade(&self.bindings),
            key: key.clone(),
            id,
        };
        debug!(context = %key, tx = %id, "Binding new transaction");
        Binding {
            id,
            transaction: Arc::new(Mutex::new(create(handle))),
        }
    }

    /// Transaction currently bound to `key`
    pub fn get(&self, key: &ContextKey) -> Option<SharedTransaction> {
        self.bindings
            .get(key)
            .map(|binding| Arc::clone(&binding.transaction))
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Unbind `key` whatever transaction it holds
    pub fn release(&self, key: &ContextKey) -> bool {
        self.bindings.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Acquire the context's transaction for the lifetime of the returned scope
    pub(crate) fn scope<F>(&self, key: ContextKey, create: F) -> TransactionScope
    where
        F: FnOnce(RegistryBinding) -> Transaction,
    {
        let (id, transaction) = self.acquire(&key, create);
        TransactionScope {
            key,
            id,
            table: Arc::downgrade(&self.bindings),
            transaction,
        }
    }
}

fn is_live(transaction: &SharedTransaction) -> bool {
    match transaction.try_lock() {
        Ok(guard) => guard.is_active(),
        Err(_) => true,
    }
}

/// Scoped acquisition of a context's transaction.
///
/// Dropping the scope unbinds the transaction on every path, including early
/// returns, errors and panics.
pub struct TransactionScope {
    key: ContextKey,
    id: TransactionId,
    table: Weak<BindingTable>,
    transaction: SharedTransaction,
}

impl TransactionScope {
    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    pub fn transaction(&self) -> &SharedTransaction {
        &self.transaction
    }

    pub async fn lock(&self) -> MutexGuard<'_, Transaction> {
        self.transaction.lock().await
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            if unbind(&table, &self.key, self.id) {
                debug!(context = %self.key, tx = %self.id, "Scope released transaction binding");
            }
        }
    }
}
