//! Sessions and snapshot transactions of the in-memory store.

use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::collections::HashSet;
use tracing::trace;
use uuid::Uuid;

use uowlayer_core::{
    backend::ClientSession,
    error::{UnitOfWorkError, UnitOfWorkResult},
    transaction::TransactionOptions,
};

use crate::store::{InMemoryStore, StoreMap};

/// Writes staged by a running transaction.
#[derive(Debug)]
struct Staged {
    collections: StoreMap,
    touched: HashSet<String>,
}

/// A session of [`InMemoryStore`].
///
/// While a transaction runs, reads and writes passed this session see a
/// private snapshot of the store taken when the transaction started. There
/// is no write-conflict detection: the last commit wins per collection.
#[derive(Debug)]
pub struct InMemorySession {
    id: Uuid,
    store: InMemoryStore,
    staged: Option<Staged>,
}

impl InMemorySession {
    pub(crate) fn new(store: InMemoryStore) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            staged: None,
        }
    }

    /// The collection as seen by the running transaction, if any.
    pub(crate) fn staged(&self, collection: &str) -> Option<Option<&Vec<BsonDocument>>> {
        self.staged
            .as_ref()
            .map(|staged| staged.collections.get(collection))
    }

    /// The collection for writing within the running transaction, if any.
    pub(crate) fn staged_mut(&mut self, collection: &str) -> Option<&mut Vec<BsonDocument>> {
        let staged = self.staged.as_mut()?;
        staged.touched.insert(collection.to_string());

        Some(staged.collections.entry(collection.to_string()).or_default())
    }

    fn no_transaction(&self, action: &str) -> UnitOfWorkError {
        UnitOfWorkError::Backend(format!(
            "cannot {} transaction: no transaction started on session {}",
            action, self.id
        ))
    }
}

#[async_trait]
impl ClientSession for InMemorySession {
    fn id(&self) -> String {
        self.id.to_string()
    }

    async fn start_transaction(&mut self, _options: &TransactionOptions) -> UnitOfWorkResult<()> {
        if self.staged.is_some() {
            return Err(UnitOfWorkError::Backend(format!(
                "transaction already in progress on session {}",
                self.id
            )));
        }
        self.store.topology.check_transactions()?;

        let snapshot = self.store.state.read().await.clone();
        self.staged = Some(Staged {
            collections: snapshot,
            touched: HashSet::new(),
        });
        trace!(session_id = %self.id, "snapshot taken");

        Ok(())
    }

    async fn commit_transaction(&mut self) -> UnitOfWorkResult<()> {
        let Some(mut staged) = self.staged.take() else {
            return Err(self.no_transaction("commit"));
        };

        let mut state = self.store.state.write().await;
        for name in staged.touched {
            match staged.collections.remove(&name) {
                Some(documents) => state.insert(name, documents),
                None => state.remove(&name),
            };
        }
        trace!(session_id = %self.id, "transaction published");

        Ok(())
    }

    async fn abort_transaction(&mut self) -> UnitOfWorkResult<()> {
        if self.staged.take().is_none() {
            return Err(self.no_transaction("abort"));
        }
        trace!(session_id = %self.id, "snapshot discarded");

        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }
}
