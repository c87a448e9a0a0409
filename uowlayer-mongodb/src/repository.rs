//! Typed repositories over MongoDB collections.

use async_trait::async_trait;
use bson::{Document as BsonDocument, doc};
use futures::TryStreamExt;
use mongodb::{
    Collection, Database,
    options::{CollectionOptions, ReadConcern, ReadPreference, SelectionCriteria, WriteConcern},
};
use std::fmt;
use tracing::debug;

use uowlayer_core::{
    backend::Repository,
    document::{Document, DocumentExt, ID_FIELD},
    error::UnitOfWorkResult,
    naming::resolve_collection_name,
    page::{PagedList, PaginationParams},
    query::{Expr, Sort},
};

use crate::{
    client::DatabaseBuilder,
    error::{NAMESPACE_EXISTS, collection_error, driver_error, error_code},
    paging::{facet_pipeline, read_facets},
    query::{MongoQueryTranslator, sort_document},
    session::MongoSession,
};

/// Durability profile of every repository collection: majority writes,
/// local reads, reads routed to the primary.
fn collection_options() -> CollectionOptions {
    let mut options = CollectionOptions::default();
    options.write_concern = Some(WriteConcern::majority());
    options.read_concern = Some(ReadConcern::local());
    options.selection_criteria = Some(SelectionCriteria::ReadPreference(ReadPreference::Primary));

    options
}

/// Creates the collection unless it already exists.
async fn ensure_collection(database: &Database, name: &str) -> UnitOfWorkResult<()> {
    let existing = database
        .list_collection_names()
        .filter(doc! { "name": name })
        .await
        .map_err(driver_error)?;
    if !existing.is_empty() {
        return Ok(());
    }

    match database.create_collection(name).await {
        Ok(()) => {
            debug!(collection = %name, "collection created");
            Ok(())
        }
        // Lost a creation race to another process.
        Err(error) if error_code(&error) == Some(NAMESPACE_EXISTS) => Ok(()),
        Err(error) => Err(driver_error(error)),
    }
}

/// Repository for documents of type `D` stored in a MongoDB collection.
pub struct MongoRepository<D: Document> {
    collection: Collection<D>,
}

impl<D: Document> fmt::Debug for MongoRepository<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoRepository")
            .field("collection", &self.collection.name())
            .finish()
    }
}

impl<D: Document> MongoRepository<D> {
    /// Resolves the collection name for `D`, creates the collection if
    /// absent, and binds it with the repository durability profile.
    pub(crate) async fn create(builder: &DatabaseBuilder) -> UnitOfWorkResult<Self> {
        let name = resolve_collection_name(builder.collection_name_selector().as_ref(), D::type_name())?;
        let database = builder.database().await?;

        ensure_collection(&database, &name).await?;
        debug!(collection = %name, document = D::type_name(), "collection ready");

        Ok(Self {
            collection: database.collection_with_options(&name, collection_options()),
        })
    }

    /// The underlying driver collection, for operations outside the repository API.
    pub fn collection(&self) -> &Collection<D> {
        &self.collection
    }

    fn name(&self) -> &str {
        self.collection.name()
    }
}

#[async_trait]
impl<D: Document> Repository<D> for MongoRepository<D> {
    type Session = MongoSession;

    fn collection_name(&self) -> &str {
        self.name()
    }

    async fn insert_one(&self, document: &D, session: Option<&mut MongoSession>) -> UnitOfWorkResult<()> {
        let mut action = self.collection.insert_one(document);
        if let Some(session) = session {
            action = action.session(session.inner_mut());
        }
        action.await.map_err(collection_error(self.name()))?;

        Ok(())
    }

    async fn insert_many(&self, documents: &[D], session: Option<&mut MongoSession>) -> UnitOfWorkResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut action = self.collection.insert_many(documents);
        if let Some(session) = session {
            action = action.session(session.inner_mut());
        }
        action.await.map_err(collection_error(self.name()))?;

        Ok(())
    }

    async fn find(
        &self,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&mut MongoSession>,
    ) -> UnitOfWorkResult<Vec<D>> {
        let mut action = self.collection.find(MongoQueryTranslator::translate(filter)?);
        if let Some(sort) = sort.filter(|sort| !sort.is_empty()) {
            action = action.sort(sort_document(sort));
        }

        match session {
            Some(session) => {
                let mut cursor = action
                    .session(session.inner_mut())
                    .await
                    .map_err(driver_error)?;
                cursor
                    .stream(session.inner_mut())
                    .try_collect()
                    .await
                    .map_err(driver_error)
            }
            None => action
                .await
                .map_err(driver_error)?
                .try_collect()
                .await
                .map_err(driver_error),
        }
    }

    async fn count(&self, filter: &Expr, session: Option<&mut MongoSession>) -> UnitOfWorkResult<u64> {
        let mut action = self
            .collection
            .count_documents(MongoQueryTranslator::translate(filter)?);
        if let Some(session) = session {
            action = action.session(session.inner_mut());
        }

        action.await.map_err(driver_error)
    }

    async fn replace_one(&self, document: &D, session: Option<&mut MongoSession>) -> UnitOfWorkResult<bool> {
        let mut action = self
            .collection
            .replace_one(doc! { ID_FIELD: document.id_bson()? }, document);
        if let Some(session) = session {
            action = action.session(session.inner_mut());
        }

        let result = action.await.map_err(collection_error(self.name()))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_many(&self, filter: &Expr, session: Option<&mut MongoSession>) -> UnitOfWorkResult<u64> {
        let mut action = self
            .collection
            .delete_many(MongoQueryTranslator::translate(filter)?);
        if let Some(session) = session {
            action = action.session(session.inner_mut());
        }

        Ok(action.await.map_err(driver_error)?.deleted_count)
    }

    async fn get_paged(
        &self,
        params: PaginationParams,
        filter: &Expr,
        sort: &Sort,
        session: Option<&mut MongoSession>,
    ) -> UnitOfWorkResult<PagedList<D>> {
        let pipeline = facet_pipeline(MongoQueryTranslator::translate(filter)?, sort, &params)?;

        let facets: Option<BsonDocument> = match session {
            Some(session) => {
                let mut cursor = self
                    .collection
                    .aggregate(pipeline)
                    .session(session.inner_mut())
                    .await
                    .map_err(driver_error)?;
                cursor
                    .next(session.inner_mut())
                    .await
                    .transpose()
                    .map_err(driver_error)?
            }
            None => self
                .collection
                .aggregate(pipeline)
                .await
                .map_err(driver_error)?
                .try_next()
                .await
                .map_err(driver_error)?,
        };

        let (total_count, documents) = read_facets(facets)?;
        let items = documents
            .into_iter()
            .map(D::from_bson_document)
            .collect::<UnitOfWorkResult<Vec<_>>>()?;

        Ok(PagedList::new(&params, total_count, items))
    }

    async fn get_paged_by_cursor(
        &self,
        params: PaginationParams,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&mut MongoSession>,
    ) -> UnitOfWorkResult<PagedList<D>> {
        params.validate()?;

        let drained = self.find(filter, sort, session).await?;
        params.paginate(drained)
    }
}
