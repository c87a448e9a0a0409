//! A thin "unit of work" and generic repository layer over document stores.
//!
//! This crate is the backend-agnostic core of the uowlayer project and provides:
//!
//! - **Documents** ([`document`]) - The trait every persisted type implements
//! - **Collection naming** ([`naming`]) - Type name to collection name resolution
//! - **Settings** ([`settings`]) - Connection settings and their loading from configuration files
//! - **Filters and sorts** ([`query`]) - Backend-agnostic filter expressions and sort keys
//! - **Paging** ([`page`]) - Page parameters and paged results
//! - **Backend abstraction** ([`backend`]) - Sessions, repositories and the backend factory
//! - **Transactions** ([`transaction`]) - Transaction options, context and scope
//! - **Coordinator** ([`unit_of_work`]) - Runs operations inside transactions, caches repositories
//! - **Readiness** ([`readiness`]) - Waits for a replica set to accept transactions
//! - **Error handling** ([`error`]) - The error taxonomy shared by every backend
//!
//! # Example
//!
//! ```ignore
//! use uowlayer::prelude::*;
//! use futures::FutureExt;
//!
//! let unit_of_work = UnitOfWork::new(backend);
//! unit_of_work.ensure_replica_set_ready(&CancellationToken::new()).await?;
//!
//! let page = unit_of_work
//!     .run_in_transaction::<Invoice, _, _>(TransactionContext::default(), |repository, scope| {
//!         async move {
//!             repository
//!                 .get_paged(PaginationParams::new(0, 10), &Filter::all(), &Sort::ascending("_id"), Some(scope.session_mut()))
//!                 .await
//!         }
//!         .boxed()
//!     })
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as uowlayer_core;

pub mod backend;
pub mod document;
pub mod error;
pub mod naming;
pub mod page;
pub mod query;
pub mod readiness;
pub mod settings;
pub mod transaction;
pub mod unit_of_work;
