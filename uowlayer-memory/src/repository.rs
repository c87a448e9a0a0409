//! Typed repositories over in-memory collections.

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use std::{fmt, marker::PhantomData};

use uowlayer_core::{
    backend::Repository,
    document::{Document, DocumentExt, ID_FIELD},
    error::{UnitOfWorkError, UnitOfWorkResult},
    page::{PagedList, PaginationParams},
    query::{Expr, Sort},
};

use crate::{
    evaluator::{DocumentEvaluator, sort_documents},
    session::InMemorySession,
    store::InMemoryStore,
};

/// Repository for documents of type `D` stored in an [`InMemoryStore`].
///
/// Operations given a session with a running transaction work on that
/// transaction's snapshot; all others work on the shared store directly.
pub struct InMemoryRepository<D> {
    store: InMemoryStore,
    collection: String,
    _document: PhantomData<fn() -> D>,
}

impl<D> fmt::Debug for InMemoryRepository<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("collection", &self.collection)
            .finish()
    }
}

impl<D: Document> InMemoryRepository<D> {
    pub(crate) fn new(store: InMemoryStore, collection: String) -> Self {
        Self {
            store,
            collection,
            _document: PhantomData,
        }
    }

    /// Runs `read` against the collection as seen through `session`.
    async fn read<R>(
        &self,
        session: Option<&InMemorySession>,
        read: impl FnOnce(&[BsonDocument]) -> R + Send,
    ) -> R {
        if let Some(staged) = session.and_then(|session| session.staged(&self.collection)) {
            return read(staged.map(Vec::as_slice).unwrap_or_default());
        }

        let state = self.store.state.read().await;
        read(state.get(&self.collection).map(Vec::as_slice).unwrap_or_default())
    }

    /// Runs `write` against the collection as seen through `session`.
    async fn write<R>(
        &self,
        session: Option<&mut InMemorySession>,
        write: impl FnOnce(&mut Vec<BsonDocument>) -> R + Send,
    ) -> R {
        if let Some(staged) = session.and_then(|session| session.staged_mut(&self.collection)) {
            return write(staged);
        }

        let mut state = self.store.state.write().await;
        write(state.entry(self.collection.clone()).or_default())
    }

    /// Matches, sorts and copies documents out of the collection.
    async fn select(
        &self,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&InMemorySession>,
    ) -> Vec<BsonDocument> {
        let mut documents = self
            .read(session, |collection| DocumentEvaluator::filter_documents(collection, filter))
            .await;

        if let Some(sort) = sort {
            sort_documents(&mut documents, sort);
        }

        documents
    }

    fn insert_into(&self, collection: &mut Vec<BsonDocument>, document: BsonDocument) -> UnitOfWorkResult<()> {
        let id = document.get(ID_FIELD).cloned().unwrap_or(Bson::Null);

        if collection.iter().any(|stored| stored.get(ID_FIELD) == Some(&id)) {
            return Err(UnitOfWorkError::DocumentAlreadyExists(
                id.to_string(),
                self.collection.clone(),
            ));
        }

        collection.push(document);
        Ok(())
    }
}

fn decode_all<D: Document>(documents: Vec<BsonDocument>) -> UnitOfWorkResult<Vec<D>> {
    documents.into_iter().map(D::from_bson_document).collect()
}

#[async_trait]
impl<D: Document> Repository<D> for InMemoryRepository<D> {
    type Session = InMemorySession;

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn insert_one(&self, document: &D, session: Option<&mut InMemorySession>) -> UnitOfWorkResult<()> {
        let encoded = document.to_bson_document()?;

        self.write(session, |collection| self.insert_into(collection, encoded))
            .await
    }

    async fn insert_many(&self, documents: &[D], session: Option<&mut InMemorySession>) -> UnitOfWorkResult<()> {
        let encoded = documents
            .iter()
            .map(|document| document.to_bson_document())
            .collect::<UnitOfWorkResult<Vec<_>>>()?;

        self.write(session, |collection| {
            encoded
                .into_iter()
                .try_for_each(|document| self.insert_into(collection, document))
        })
        .await
    }

    async fn find(
        &self,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&mut InMemorySession>,
    ) -> UnitOfWorkResult<Vec<D>> {
        decode_all(self.select(filter, sort, session.as_deref()).await)
    }

    async fn count(&self, filter: &Expr, session: Option<&mut InMemorySession>) -> UnitOfWorkResult<u64> {
        Ok(self
            .read(session.as_deref(), |collection| {
                collection
                    .iter()
                    .filter(|document| DocumentEvaluator::matches(document, filter))
                    .count() as u64
            })
            .await)
    }

    async fn replace_one(&self, document: &D, session: Option<&mut InMemorySession>) -> UnitOfWorkResult<bool> {
        let encoded = document.to_bson_document()?;
        let id = document.id_bson()?;

        Ok(self
            .write(session, |collection| {
                match collection.iter_mut().find(|stored| stored.get(ID_FIELD) == Some(&id)) {
                    Some(stored) => {
                        *stored = encoded;
                        true
                    }
                    None => false,
                }
            })
            .await)
    }

    async fn delete_many(&self, filter: &Expr, session: Option<&mut InMemorySession>) -> UnitOfWorkResult<u64> {
        Ok(self
            .write(session, |collection| {
                let before = collection.len();
                collection.retain(|document| !DocumentEvaluator::matches(document, filter));
                (before - collection.len()) as u64
            })
            .await)
    }

    async fn get_paged(
        &self,
        params: PaginationParams,
        filter: &Expr,
        sort: &Sort,
        session: Option<&mut InMemorySession>,
    ) -> UnitOfWorkResult<PagedList<D>> {
        params.validate()?;
        if sort.is_empty() {
            return Err(UnitOfWorkError::InvalidArgument(
                "a sort is required for aggregated paging".to_string(),
            ));
        }

        let matched = self.select(filter, Some(sort), session.as_deref()).await;
        let total_count = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(params.offset())
            .take(params.page_size)
            .collect();

        Ok(PagedList::new(&params, total_count, decode_all(items)?))
    }

    async fn get_paged_by_cursor(
        &self,
        params: PaginationParams,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&mut InMemorySession>,
    ) -> UnitOfWorkResult<PagedList<D>> {
        params.validate()?;

        let drained = self.select(filter, sort, session.as_deref()).await;
        let page = params.paginate(drained)?;
        let items = decode_all(page.items)?;

        Ok(PagedList::new(&params, page.total_count, items))
    }
}
