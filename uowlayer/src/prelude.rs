//! Convenient re-exports of commonly used types from uowlayer.
//!
//! ```ignore
//! use uowlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and the `Document` derive
//! - The unit-of-work coordinator, transaction options and context
//! - Backend, session and repository traits
//! - Filters, sorts and paging types
//! - Settings, naming and error types

pub use uowlayer_core::{
    backend::{ClientSession, Repository, UnitOfWorkBackend, UnitOfWorkBackendBuilder},
    document::{Document, DocumentExt},
    error::{UnitOfWorkError, UnitOfWorkResult},
    naming::{CollectionNameSelector, DefaultCollectionNameSelector, OverrideCollectionNameSelector},
    page::{PagedList, PaginationParams},
    query::{Expr, FieldOp, Filter, Sort, SortDirection},
    readiness::{Backoff, ReadinessProber},
    settings::DatabaseSettings,
    transaction::{
        ReadConcernLevel, ReadPreferenceMode, TransactionContext, TransactionOptions, TransactionScope,
        TransactionState, WriteConcernLevel,
    },
    unit_of_work::UnitOfWork,
};

pub use uowlayer_macros::Document;

pub use tokio_util::sync::CancellationToken;
