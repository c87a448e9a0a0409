//! In-memory document store backend for uowlayer.
//!
//! This crate implements the unit-of-work backend traits entirely in memory.
//! It is meant for development and tests: it behaves like a single-node
//! replica set, with sessions, snapshot transactions and the same paging
//! semantics as the MongoDB backend.
//!
//! # Features
//!
//! - **Snapshot transactions** - Writes are staged per session and published on commit
//! - **Filtering and sorting** - Evaluates filter expressions, including dotted field paths
//! - **Topology simulation** - Can behave like a standalone server, or like a replica set
//!   that needs a few attempts before it accepts transactions
//!
//! # Quick Start
//!
//! ```ignore
//! use uowlayer::prelude::*;
//! use uowlayer_memory::InMemoryStore;
//! use futures::FutureExt;
//!
//! #[tokio::main]
//! async fn main() -> UnitOfWorkResult<()> {
//!     let unit_of_work = UnitOfWork::new(InMemoryStore::new());
//!
//!     unit_of_work
//!         .use_transaction::<Invoice, _, _>(
//!             |repository, session, _| {
//!                 async move { repository.insert_one(&Invoice::new(1), Some(session)).await }.boxed()
//!             },
//!             None,
//!             None,
//!             &CancellationToken::new(),
//!         )
//!         .await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as uowlayer_memory;

mod evaluator;
pub mod repository;
pub mod session;
pub mod store;

pub use repository::InMemoryRepository;
pub use session::InMemorySession;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
