//! Storage backend abstraction for the unit of work.
//!
//! This module defines the traits a document store has to implement so the
//! [`UnitOfWork`](crate::unit_of_work::UnitOfWork) coordinator can drive it:
//!
//! - [`ClientSession`]: a logical session able to run one transaction at a time
//! - [`Repository`]: typed access to the collection of one document type
//! - [`UnitOfWorkBackend`]: the factory for sessions and repositories, which
//!   also provides the replica-set readiness probe
//! - [`UnitOfWorkBackendBuilder`]: constructs a backend from its settings
//!
//! Every repository operation takes an optional session. Passing the session
//! of a running transaction makes the operation part of that transaction;
//! passing `None` runs it on its own.
//!
//! # Examples
//!
//! ```ignore
//! use uowlayer::backend::{Repository, UnitOfWorkBackend};
//! use uowlayer::query::Filter;
//!
//! let repository = backend.create_repository::<Invoice>().await?;
//! repository.insert_one(&invoice, None).await?;
//! let open = repository.count(&Filter::eq("paid", false), None).await?;
//! ```

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    document::Document,
    error::UnitOfWorkResult,
    page::{PagedList, PaginationParams},
    query::{Expr, Sort},
    readiness::ReplicaSetProbe,
    transaction::TransactionOptions,
};

/// A logical session against the store.
///
/// Dropping a session releases it. A session runs at most one transaction at
/// a time.
#[async_trait]
pub trait ClientSession: Send + Sync + Debug {
    /// A printable identifier of the session, used in log records.
    fn id(&self) -> String;

    /// Starts a transaction on this session.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::NotSupported`](crate::error::UnitOfWorkError::NotSupported)
    /// when the deployment cannot run multi-document transactions.
    async fn start_transaction(&mut self, options: &TransactionOptions) -> UnitOfWorkResult<()>;

    /// Commits the running transaction.
    async fn commit_transaction(&mut self) -> UnitOfWorkResult<()>;

    /// Aborts the running transaction, discarding its writes.
    async fn abort_transaction(&mut self) -> UnitOfWorkResult<()>;

    /// Returns `true` while a transaction is running on this session.
    fn in_transaction(&self) -> bool;
}

/// Typed access to the collection holding documents of type `D`.
///
/// Store failures are returned mapped onto
/// [`UnitOfWorkError`](crate::error::UnitOfWorkError) with their kind preserved.
#[async_trait]
pub trait Repository<D: Document>: Send + Sync + Debug + 'static {
    /// The session type operations can be enlisted with.
    type Session: ClientSession;

    /// The physical name of the collection.
    fn collection_name(&self) -> &str;

    /// Inserts a document.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::DocumentAlreadyExists`](crate::error::UnitOfWorkError::DocumentAlreadyExists)
    /// when a document with the same identity is already stored.
    async fn insert_one(&self, document: &D, session: Option<&mut Self::Session>) -> UnitOfWorkResult<()>;

    /// Inserts documents in order, stopping at the first failure.
    async fn insert_many(&self, documents: &[D], session: Option<&mut Self::Session>) -> UnitOfWorkResult<()>;

    /// Returns every document matching `filter`, ordered by `sort` when given.
    async fn find(
        &self,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&mut Self::Session>,
    ) -> UnitOfWorkResult<Vec<D>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: &Expr, session: Option<&mut Self::Session>) -> UnitOfWorkResult<u64>;

    /// Replaces the stored document with the same identity.
    /// Returns `false` when no such document exists.
    async fn replace_one(&self, document: &D, session: Option<&mut Self::Session>) -> UnitOfWorkResult<bool>;

    /// Deletes every document matching `filter` and returns how many were removed.
    async fn delete_many(&self, filter: &Expr, session: Option<&mut Self::Session>) -> UnitOfWorkResult<u64>;

    /// Retrieves one page using a single aggregation: the store counts the
    /// matches and slices the sorted result in the same round trip.
    ///
    /// # Arguments
    ///
    /// * `params` - The 0-based page index and page size
    /// * `filter` - Selects the documents to page through
    /// * `sort` - The page order; required so that pages are stable
    /// * `session` - Optional session to enlist the read with
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::InvalidArgument`](crate::error::UnitOfWorkError::InvalidArgument)
    /// for a zero page size or an empty sort.
    async fn get_paged(
        &self,
        params: PaginationParams,
        filter: &Expr,
        sort: &Sort,
        session: Option<&mut Self::Session>,
    ) -> UnitOfWorkResult<PagedList<D>>;

    /// Retrieves one page by draining a cursor over every match and slicing it
    /// in memory. The total count is the number of drained documents.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::InvalidArgument`](crate::error::UnitOfWorkError::InvalidArgument)
    /// for a zero page size.
    async fn get_paged_by_cursor(
        &self,
        params: PaginationParams,
        filter: &Expr,
        sort: Option<&Sort>,
        session: Option<&mut Self::Session>,
    ) -> UnitOfWorkResult<PagedList<D>>;
}

/// A document store the unit of work can coordinate.
///
/// Implementations hand out sessions and build repositories. They also
/// implement [`ReplicaSetProbe`] so callers can wait for the store to accept
/// transactions before relying on them.
#[async_trait]
pub trait UnitOfWorkBackend: ReplicaSetProbe + Debug + Send + Sync + 'static {
    /// The session type of this store.
    type Session: ClientSession + 'static;

    /// The repository type of this store for documents of type `D`.
    type Repository<D: Document>: Repository<D, Session = Self::Session>;

    /// Starts a new session.
    async fn start_session(&self) -> UnitOfWorkResult<Self::Session>;

    /// Builds a repository for `D`, resolving its collection name and
    /// creating the collection if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::Configuration`](crate::error::UnitOfWorkError::Configuration)
    /// when the collection name resolves to an empty string.
    async fn create_repository<D: Document>(&self) -> UnitOfWorkResult<Self::Repository<D>>;
}

/// Constructs a backend.
#[async_trait]
pub trait UnitOfWorkBackendBuilder {
    type Backend: UnitOfWorkBackend;

    async fn build(self) -> UnitOfWorkResult<Self::Backend>;
}
