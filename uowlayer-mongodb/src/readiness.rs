//! Transaction-capability probe against a live deployment.

use async_trait::async_trait;
use bson::Document;
use tracing::trace;

use uowlayer_core::{
    error::UnitOfWorkResult,
    readiness::{ReplicaSetProbe, SCRATCH_COLLECTION, SCRATCH_DATABASE},
};

use crate::{backend::MongoBackend, error::driver_error};

#[async_trait]
impl ReplicaSetProbe for MongoBackend {
    async fn probe_transactions(&self) -> UnitOfWorkResult<()> {
        let client = self.builder.client().await?;

        client
            .database(SCRATCH_DATABASE)
            .collection::<Document>(SCRATCH_COLLECTION)
            .drop()
            .await
            .map_err(driver_error)?;

        let mut session = client.start_session().await.map_err(driver_error)?;
        session.start_transaction().await.map_err(driver_error)?;
        session.abort_transaction().await.map_err(driver_error)?;
        trace!("transaction probe succeeded");

        Ok(())
    }

    async fn drop_scratch(&self) -> UnitOfWorkResult<()> {
        self.builder
            .client()
            .await?
            .database(SCRATCH_DATABASE)
            .drop()
            .await
            .map_err(driver_error)
    }

    fn probe_transactions_blocking(&self) -> UnitOfWorkResult<()> {
        let client = self.builder.blocking_client()?;

        client
            .database(SCRATCH_DATABASE)
            .collection::<Document>(SCRATCH_COLLECTION)
            .drop()
            .run()
            .map_err(driver_error)?;

        let mut session = client.start_session().run().map_err(driver_error)?;
        session.start_transaction().run().map_err(driver_error)?;
        session.abort_transaction().run().map_err(driver_error)?;
        trace!("transaction probe succeeded");

        Ok(())
    }

    fn drop_scratch_blocking(&self) -> UnitOfWorkResult<()> {
        self.builder
            .blocking_client()?
            .database(SCRATCH_DATABASE)
            .drop()
            .run()
            .map_err(driver_error)
    }
}
