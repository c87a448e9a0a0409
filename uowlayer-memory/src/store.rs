//! In-memory storage backend.
//!
//! Collections are kept in insertion order as BSON documents behind an
//! async-safe read-write lock. Sessions snapshot the collections when a
//! transaction starts; commit publishes every collection the transaction
//! wrote to, abort drops the snapshot.

use async_trait::async_trait;
use bson::Document as BsonDocument;
use mea::rwlock::RwLock;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::debug;

use uowlayer_core::{
    backend::{UnitOfWorkBackend, UnitOfWorkBackendBuilder},
    document::Document,
    error::{UnitOfWorkError, UnitOfWorkResult},
    naming::{CollectionNameSelector, DefaultCollectionNameSelector, resolve_collection_name},
    readiness::ReplicaSetProbe,
};

use crate::{repository::InMemoryRepository, session::InMemorySession};

pub(crate) type StoreMap = HashMap<String, Vec<BsonDocument>>;

/// Message of the error raised when transactions are unavailable.
const TRANSACTIONS_UNSUPPORTED: &str = "Transactions are not supported by this deployment";

/// Whether the store currently accepts transactions.
#[derive(Debug, Default)]
pub(crate) struct Topology {
    standalone: bool,
    pending_elections: AtomicUsize,
    probes: AtomicUsize,
}

impl Topology {
    /// Fails with `NotSupported` on a standalone store, or while simulated
    /// elections are pending. Each failed check completes one election.
    pub(crate) fn check_transactions(&self) -> UnitOfWorkResult<()> {
        if self.standalone {
            return Err(UnitOfWorkError::NotSupported(TRANSACTIONS_UNSUPPORTED.to_string()));
        }

        let elected = self
            .pending_elections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| pending.checked_sub(1));
        if elected.is_ok() {
            return Err(UnitOfWorkError::NotSupported(format!(
                "{}: no primary elected yet",
                TRANSACTIONS_UNSUPPORTED
            )));
        }

        Ok(())
    }
}

/// Thread-safe in-memory document store.
///
/// Clones share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use uowlayer_memory::InMemoryStore;
/// use uowlayer::unit_of_work::UnitOfWork;
///
/// let unit_of_work = UnitOfWork::new(InMemoryStore::new());
/// let invoices = unit_of_work.get_repository::<Invoice>().await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    pub(crate) state: Arc<RwLock<StoreMap>>,
    pub(crate) topology: Arc<Topology>,
    selector: Arc<dyn CollectionNameSelector>,
}

impl InMemoryStore {
    /// Creates an empty store that accepts transactions right away.
    pub fn new() -> Self {
        InMemoryStoreBuilder::default().finish()
    }

    /// Creates a builder for a store with custom naming or topology.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    pub fn collection_name_selector(&self) -> &Arc<dyn CollectionNameSelector> {
        &self.selector
    }

    /// Names of the collections currently stored.
    pub async fn list_collections(&self) -> Vec<String> {
        self.state.read().await.keys().cloned().collect()
    }

    /// Number of readiness probe attempts made so far.
    pub fn probe_attempts(&self) -> usize {
        self.topology.probes.load(Ordering::SeqCst)
    }

    fn probe(&self) -> UnitOfWorkResult<()> {
        self.topology.probes.fetch_add(1, Ordering::SeqCst);
        self.topology.check_transactions()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWorkBackend for InMemoryStore {
    type Session = InMemorySession;
    type Repository<D: Document> = InMemoryRepository<D>;

    async fn start_session(&self) -> UnitOfWorkResult<Self::Session> {
        Ok(InMemorySession::new(self.clone()))
    }

    async fn create_repository<D: Document>(&self) -> UnitOfWorkResult<Self::Repository<D>> {
        let name = resolve_collection_name(self.selector.as_ref(), D::type_name())?;

        self.state
            .write()
            .await
            .entry(name.clone())
            .or_default();
        debug!(collection = %name, document = D::type_name(), "collection ready");

        Ok(InMemoryRepository::new(self.clone(), name))
    }
}

#[async_trait]
impl ReplicaSetProbe for InMemoryStore {
    async fn probe_transactions(&self) -> UnitOfWorkResult<()> {
        self.probe()
    }

    async fn drop_scratch(&self) -> UnitOfWorkResult<()> {
        Ok(())
    }

    fn probe_transactions_blocking(&self) -> UnitOfWorkResult<()> {
        self.probe()
    }

    fn drop_scratch_blocking(&self) -> UnitOfWorkResult<()> {
        Ok(())
    }
}

/// Builder for [`InMemoryStore`].
///
/// # Example
///
/// ```ignore
/// use uowlayer_memory::InMemoryStore;
///
/// // rejects transactions like a standalone server
/// let standalone = InMemoryStore::builder().standalone(true).finish();
///
/// // accepts transactions after three failed attempts
/// let electing = InMemoryStore::builder().ready_after(3).finish();
/// ```
#[derive(Debug)]
pub struct InMemoryStoreBuilder {
    standalone: bool,
    ready_after: usize,
    selector: Arc<dyn CollectionNameSelector>,
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self {
            standalone: false,
            ready_after: 0,
            selector: Arc::new(DefaultCollectionNameSelector),
        }
    }
}

impl InMemoryStoreBuilder {
    /// Makes every transaction start fail with `NotSupported`.
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    /// Makes the first `attempts` transaction starts fail with `NotSupported`,
    /// like a replica set that has not elected a primary yet.
    pub fn ready_after(mut self, attempts: usize) -> Self {
        self.ready_after = attempts;
        self
    }

    /// Sets the selector resolving collection names.
    pub fn collection_name_selector(mut self, selector: Arc<dyn CollectionNameSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Builds the store synchronously.
    pub fn finish(self) -> InMemoryStore {
        InMemoryStore {
            state: Arc::new(RwLock::new(StoreMap::new())),
            topology: Arc::new(Topology {
                standalone: self.standalone,
                pending_elections: AtomicUsize::new(self.ready_after),
                probes: AtomicUsize::new(0),
            }),
            selector: self.selector,
        }
    }
}

#[async_trait]
impl UnitOfWorkBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> UnitOfWorkResult<Self::Backend> {
        Ok(self.finish())
    }
}
