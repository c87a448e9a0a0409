//! A thin unit-of-work and generic repository layer for document databases.
//!
//! This crate is the primary entry point of the uowlayer project. It re-exports
//! the core types from the sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **Typed repositories** - One repository per document type, created lazily and cached
//! - **Transactions** - Operations run inside a session transaction that commits on
//!   success and aborts on failure, returning the original error
//! - **Paging** - A cursor strategy and a single round-trip aggregation strategy
//! - **Readiness** - Waits for a freshly started replica set to accept transactions
//!
//! # Quick Start
//!
//! ```ignore
//! use uowlayer::{prelude::*, memory::InMemoryStore};
//! use futures::FutureExt;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! pub struct Invoice {
//!     #[serde(rename = "_id")]
//!     pub id: i32,
//!     pub total: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> UnitOfWorkResult<()> {
//!     let unit_of_work = UnitOfWork::new(InMemoryStore::new());
//!     let cancellation = CancellationToken::new();
//!
//!     unit_of_work.ensure_replica_set_ready(&cancellation).await?;
//!
//!     // Insert inside a transaction
//!     unit_of_work
//!         .use_transaction::<Invoice, _, _>(
//!             |repository, session, _| {
//!                 async move {
//!                     repository
//!                         .insert_one(&Invoice { id: 1, total: 12.5 }, Some(session))
//!                         .await
//!                 }
//!                 .boxed()
//!             },
//!             None,
//!             None,
//!             &cancellation,
//!         )
//!         .await?;
//!
//!     // Read the first page
//!     let invoices = unit_of_work.get_repository::<Invoice>().await?;
//!     let page = invoices
//!         .get_paged(PaginationParams::new(0, 10), &Filter::all(), &Sort::ascending("_id"), None)
//!         .await?;
//!
//!     println!("{} of {} invoices", page.items.len(), page.total_count);
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as uowlayer;

pub mod prelude;

pub use uowlayer_core::{
    backend, document, error, naming, page, query, readiness, settings, transaction, unit_of_work,
};

pub use uowlayer_macros::Document;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use uowlayer_memory::{InMemoryRepository, InMemorySession, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use uowlayer_mongodb::{DatabaseBuilder, MongoBackend, MongoRepository, MongoSession};
}
