//! The transactional unit-of-work coordinator.
//!
//! [`UnitOfWork`] owns the lifecycle of a session and its transaction around
//! a caller-supplied operation:
//!
//! 1. acquire a session (the supplied one, or a new one),
//! 2. start a transaction (the supplied options, or primary/snapshot/majority),
//! 3. resolve the repository (from the per-coordinator cache, or the one given),
//! 4. run the operation,
//! 5. commit on success.
//!
//! When any step fails, the transaction is aborted and the original error is
//! returned unchanged. The one exception is
//! [`UnitOfWorkError::NotSupported`]: it means the store cannot run
//! transactions at all, so it is returned immediately without an abort.
//!
//! Operations are closures returning a boxed future that borrows the
//! repository and the session:
//!
//! ```ignore
//! use futures::FutureExt;
//! use tokio_util::sync::CancellationToken;
//!
//! unit_of_work
//!     .use_transaction::<Invoice, _, _>(
//!         |repository, session, _cancellation| {
//!             async move {
//!                 repository.insert_one(&invoice, Some(session)).await?;
//!                 repository.count(&Filter::all(), Some(session)).await
//!             }
//!             .boxed()
//!         },
//!         None,
//!         None,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! ```

use futures::future::BoxFuture;
use mea::rwlock::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::{
    backend::{ClientSession, UnitOfWorkBackend},
    document::Document,
    error::{UnitOfWorkError, UnitOfWorkResult},
    readiness::ReadinessProber,
    transaction::{TransactionContext, TransactionOptions, TransactionScope, TransactionState},
};

type RepositoryCache = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Coordinates transactions and repositories over one backend.
///
/// Repositories are created lazily, one per document type, and kept until
/// [`UnitOfWork::dispose`]. The coordinator is safe to share between tasks.
#[derive(Debug)]
pub struct UnitOfWork<B: UnitOfWorkBackend> {
    backend: Arc<B>,
    prober: ReadinessProber,
    repositories: RwLock<RepositoryCache>,
}

impl<B: UnitOfWorkBackend> UnitOfWork<B> {
    /// Creates a coordinator over `backend` with the default readiness backoff.
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Creates a coordinator over a backend shared with other coordinators.
    pub fn from_shared(backend: Arc<B>) -> Self {
        Self {
            backend,
            prober: ReadinessProber::default(),
            repositories: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the prober used by [`UnitOfWork::ensure_replica_set_ready`].
    pub fn with_prober(mut self, prober: ReadinessProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns the repository for `D`, creating it on first use.
    ///
    /// Concurrent first requests for the same type yield the same instance.
    ///
    /// # Errors
    ///
    /// Propagates the backend's repository construction error, e.g.
    /// [`UnitOfWorkError::Configuration`] for an empty collection name.
    pub async fn get_repository<D: Document>(&self) -> UnitOfWorkResult<Arc<B::Repository<D>>> {
        let key = TypeId::of::<D>();

        if let Some(cached) = self.repositories.read().await.get(&key).cloned() {
            return downcast_repository::<B, D>(cached);
        }

        let mut repositories = self.repositories.write().await;
        if let Some(cached) = repositories.get(&key).cloned() {
            return downcast_repository::<B, D>(cached);
        }

        let repository = Arc::new(self.backend.create_repository::<D>().await?);
        repositories.insert(key, repository.clone());
        debug!(document = D::type_name(), "repository created");

        Ok(repository)
    }

    /// Starts a standalone session.
    pub async fn get_session(&self) -> UnitOfWorkResult<B::Session> {
        self.backend.start_session().await
    }

    /// Waits until the store accepts transactions.
    ///
    /// # Errors
    ///
    /// [`UnitOfWorkError::Cancelled`] on cancellation, or the first
    /// non-retryable probe error.
    pub async fn ensure_replica_set_ready(&self, cancellation: &CancellationToken) -> UnitOfWorkResult<()> {
        self.prober.wait_until_ready(self.backend.as_ref(), cancellation).await
    }

    /// Blocking flavour of [`UnitOfWork::ensure_replica_set_ready`].
    pub fn ensure_replica_set_ready_blocking(&self, cancellation: &CancellationToken) -> UnitOfWorkResult<()> {
        self.prober
            .wait_until_ready_blocking(self.backend.as_ref(), cancellation)
    }

    /// Runs `operation` in a transaction against the cached repository of `D`.
    ///
    /// # Arguments
    ///
    /// * `operation` - Receives the repository, the session and the cancellation token
    /// * `session` - A session to reuse; a new one is started when `None`
    /// * `options` - Transaction options; primary/snapshot/majority when `None`
    /// * `cancellation` - Aborts the transaction when triggered
    ///
    /// # Errors
    ///
    /// The error of whichever step failed, unchanged.
    pub async fn use_transaction<D, T, F>(
        &self,
        operation: F,
        session: Option<B::Session>,
        options: Option<TransactionOptions>,
        cancellation: &CancellationToken,
    ) -> UnitOfWorkResult<T>
    where
        D: Document,
        T: Send,
        F: for<'a> FnOnce(
                &'a B::Repository<D>,
                &'a mut B::Session,
                CancellationToken,
            ) -> BoxFuture<'a, UnitOfWorkResult<T>>
            + Send,
    {
        let repository = self.get_repository::<D>().await?;

        self.use_transaction_with(repository.as_ref(), operation, session, options, cancellation)
            .await
    }

    /// Runs `operation` in a transaction against a caller-supplied repository.
    ///
    /// Behaves like [`UnitOfWork::use_transaction`] otherwise.
    pub async fn use_transaction_with<D, T, F>(
        &self,
        repository: &B::Repository<D>,
        operation: F,
        session: Option<B::Session>,
        options: Option<TransactionOptions>,
        cancellation: &CancellationToken,
    ) -> UnitOfWorkResult<T>
    where
        D: Document,
        T: Send,
        F: for<'a> FnOnce(
                &'a B::Repository<D>,
                &'a mut B::Session,
                CancellationToken,
            ) -> BoxFuture<'a, UnitOfWorkResult<T>>
            + Send,
    {
        let context = TransactionContext {
            options,
            session,
            cancellation: cancellation.clone(),
        };

        self.execute(D::type_name(), repository, context, move |repository, scope| {
            let cancellation = scope.cancellation().clone();
            operation(repository, scope.session_mut(), cancellation)
        })
        .await
    }

    /// Runs `operation` in a transaction described by `context`, against the
    /// cached repository of `D`. The operation receives the transaction scope.
    pub async fn run_in_transaction<D, T, F>(
        &self,
        context: TransactionContext<B::Session>,
        operation: F,
    ) -> UnitOfWorkResult<T>
    where
        D: Document,
        T: Send,
        F: for<'a> FnOnce(
                &'a B::Repository<D>,
                &'a mut TransactionScope<B::Session>,
            ) -> BoxFuture<'a, UnitOfWorkResult<T>>
            + Send,
    {
        let repository = self.get_repository::<D>().await?;

        self.run_in_transaction_with(repository.as_ref(), context, operation)
            .await
    }

    /// Runs `operation` in a transaction described by `context`, against a
    /// caller-supplied repository.
    pub async fn run_in_transaction_with<D, T, F>(
        &self,
        repository: &B::Repository<D>,
        context: TransactionContext<B::Session>,
        operation: F,
    ) -> UnitOfWorkResult<T>
    where
        D: Document,
        T: Send,
        F: for<'a> FnOnce(
                &'a B::Repository<D>,
                &'a mut TransactionScope<B::Session>,
            ) -> BoxFuture<'a, UnitOfWorkResult<T>>
            + Send,
    {
        self.execute(D::type_name(), repository, context, operation)
            .await
    }

    /// Clears the repository cache. The backend and its client stay usable.
    pub async fn dispose(&self) {
        self.repositories.write().await.clear();
    }

    async fn execute<R, T, F>(
        &self,
        document: &'static str,
        repository: &R,
        context: TransactionContext<B::Session>,
        operation: F,
    ) -> UnitOfWorkResult<T>
    where
        R: Sync + ?Sized,
        T: Send,
        F: for<'a> FnOnce(&'a R, &'a mut TransactionScope<B::Session>) -> BoxFuture<'a, UnitOfWorkResult<T>>
            + Send,
    {
        let TransactionContext {
            options,
            session,
            cancellation,
        } = context;

        if cancellation.is_cancelled() {
            return Err(UnitOfWorkError::Cancelled);
        }

        let session = match session {
            Some(session) => session,
            None => self.backend.start_session().await?,
        };

        let span = info_span!("transaction", document, session_id = %session.id());
        let mut scope = TransactionScope::new(
            session,
            options.unwrap_or_default(),
            cancellation,
            span.clone(),
        );

        let outcome = run_operation(&mut scope, repository, operation)
            .instrument(span.clone())
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(error) if error.is_not_supported() => Err(error),
            Err(error) => {
                rollback(&mut scope, &error).instrument(span).await;
                Err(error)
            }
        }
    }
}

async fn run_operation<S, R, T, F>(
    scope: &mut TransactionScope<S>,
    repository: &R,
    operation: F,
) -> UnitOfWorkResult<T>
where
    S: ClientSession,
    R: Sync + ?Sized,
    F: for<'a> FnOnce(&'a R, &'a mut TransactionScope<S>) -> BoxFuture<'a, UnitOfWorkResult<T>>,
{
    let options = scope.options().clone();
    scope.session_mut().start_transaction(&options).await?;
    scope.set_state(TransactionState::TransactionStarted);

    let cancellation = scope.cancellation().clone();
    scope.set_state(TransactionState::OperationRunning);

    let result = {
        let running = operation(repository, &mut *scope);
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(UnitOfWorkError::Cancelled),
            result = running => result,
        }
    };
    let value = result?;

    scope.session_mut().commit_transaction().await?;
    scope.set_state(TransactionState::Committed);

    Ok(value)
}

async fn rollback<S: ClientSession>(scope: &mut TransactionScope<S>, error: &UnitOfWorkError) {
    if scope.session().in_transaction() {
        if let Err(abort_error) = scope.session_mut().abort_transaction().await {
            warn!(error = %abort_error, "failed to abort transaction");
        }
    }
    scope.set_state(TransactionState::Aborted);

    error!(
        session_id = %scope.session().id(),
        message = %error,
        "[TRANSACTION ROLLBACK]"
    );
}

fn downcast_repository<B, D>(cached: Arc<dyn Any + Send + Sync>) -> UnitOfWorkResult<Arc<B::Repository<D>>>
where
    B: UnitOfWorkBackend,
    D: Document,
{
    cached.downcast::<B::Repository<D>>().map_err(|_| {
        UnitOfWorkError::Backend(format!(
            "cached repository for {} has an unexpected type",
            D::type_name()
        ))
    })
}
