//! The MongoDB unit-of-work backend.

use async_trait::async_trait;
use std::sync::Arc;

use uowlayer_core::{
    backend::{UnitOfWorkBackend, UnitOfWorkBackendBuilder},
    document::Document,
    error::UnitOfWorkResult,
    settings::DatabaseSettings,
};

use crate::{client::DatabaseBuilder, error::driver_error, repository::MongoRepository, session::MongoSession};

/// Sessions and repositories backed by a MongoDB deployment.
///
/// Clones share the same client.
///
/// # Example
///
/// ```ignore
/// use uowlayer::prelude::*;
/// use uowlayer_mongodb::MongoBackend;
///
/// let backend = MongoBackend::connect(DatabaseSettings::load("appsettings.json")?).await?;
/// let unit_of_work = UnitOfWork::new(backend);
/// unit_of_work.ensure_replica_set_ready(&CancellationToken::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoBackend {
    pub(crate) builder: Arc<DatabaseBuilder>,
}

impl MongoBackend {
    /// Wraps `builder` without connecting. The client is built on first use.
    pub fn new(builder: DatabaseBuilder) -> Self {
        Self {
            builder: Arc::new(builder),
        }
    }

    /// Validates `settings` and builds the client.
    pub async fn connect(settings: DatabaseSettings) -> UnitOfWorkResult<Self> {
        DatabaseBuilder::new(settings).build().await
    }

    pub fn database_builder(&self) -> &DatabaseBuilder {
        &self.builder
    }
}

#[async_trait]
impl UnitOfWorkBackend for MongoBackend {
    type Session = MongoSession;
    type Repository<D: Document> = MongoRepository<D>;

    async fn start_session(&self) -> UnitOfWorkResult<Self::Session> {
        let session = self
            .builder
            .client()
            .await?
            .start_session()
            .await
            .map_err(driver_error)?;

        Ok(MongoSession::new(session))
    }

    async fn create_repository<D: Document>(&self) -> UnitOfWorkResult<Self::Repository<D>> {
        MongoRepository::create(&self.builder).await
    }
}

#[async_trait]
impl UnitOfWorkBackendBuilder for DatabaseBuilder {
    type Backend = MongoBackend;

    async fn build(self) -> UnitOfWorkResult<Self::Backend> {
        self.client().await?;

        Ok(MongoBackend::new(self))
    }
}
