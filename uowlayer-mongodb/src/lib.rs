//! MongoDB backend implementation for uowlayer.
//!
//! This crate implements the unit-of-work backend traits on top of the
//! official MongoDB driver. Transactions require a replica set or a sharded
//! cluster; on a standalone server every transactional call fails with
//! `NotSupported`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! uowlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Lazy client** - The client is built once, on first use, from [`DatabaseSettings`](uowlayer_core::settings::DatabaseSettings)
//! - **Durable collections** - Majority writes, local reads, primary routing
//! - **Two paging strategies** - A `$facet` aggregation or a drained, sorted cursor
//! - **Readiness probe** - Async and blocking probes for replica-set elections
//!
//! # Example
//!
//! ```ignore
//! use uowlayer::prelude::*;
//! use uowlayer_mongodb::MongoBackend;
//!
//! #[tokio::main]
//! async fn main() -> UnitOfWorkResult<()> {
//!     let settings = DatabaseSettings::new("shop")
//!         .with_host("localhost")
//!         .with_replica_set("rs0");
//!     let unit_of_work = UnitOfWork::new(MongoBackend::connect(settings).await?);
//!
//!     unit_of_work.ensure_replica_set_ready(&CancellationToken::new()).await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as uowlayer_mongodb;

pub mod backend;
pub mod client;
mod error;
mod paging;
mod query;
mod readiness;
pub mod repository;
pub mod session;

pub use backend::MongoBackend;
pub use client::DatabaseBuilder;
pub use repository::MongoRepository;
pub use session::MongoSession;
