//! Console walkthrough of the unit of work.
//!
//! Runs against the in-memory store by default. With the `mongodb` feature
//! and `UOWLAYER_CONFIG` pointing at a settings file, runs against MongoDB:
//!
//! ```text
//! RUST_LOG=uowlayer_core=trace UOWLAYER_CONFIG=appsettings.json \
//!     cargo run --example console --features mongodb
//! ```

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uowlayer::{memory::InMemoryStore, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "_t")]
enum Order {
    Internal {
        #[serde(rename = "_id")]
        id: i32,
        department: String,
        placed_at: DateTime<Utc>,
    },
    External {
        #[serde(rename = "_id")]
        id: i32,
        customer: String,
        placed_at: DateTime<Utc>,
    },
}

impl Document for Order {
    type Id = i32;

    fn id(&self) -> &i32 {
        match self {
            Order::Internal { id, .. } | Order::External { id, .. } => id,
        }
    }

    fn type_name() -> &'static str {
        "OrderBase"
    }
}

fn sample_orders() -> Vec<Order> {
    let now = Utc::now();

    (1..=25)
        .map(|id| match id % 2 {
            0 => Order::Internal {
                id,
                department: format!("dept-{}", id % 4),
                placed_at: now,
            },
            _ => Order::External {
                id,
                customer: format!("customer-{}", id % 5),
                placed_at: now,
            },
        })
        .collect()
}

async fn walkthrough<B: UnitOfWorkBackend>(unit_of_work: UnitOfWork<B>) -> UnitOfWorkResult<()> {
    let cancellation = CancellationToken::new();

    unit_of_work.ensure_replica_set_ready(&cancellation).await?;
    info!("replica set accepts transactions");

    let orders = sample_orders();
    unit_of_work
        .use_transaction::<Order, _, _>(
            move |repository, session, _| {
                async move {
                    repository.delete_many(&Filter::all(), Some(&mut *session)).await?;
                    repository.insert_many(&orders, Some(session)).await
                }
                .boxed()
            },
            None,
            None,
            &cancellation,
        )
        .await?;

    let repository = unit_of_work.get_repository::<Order>().await?;
    let mut params = PaginationParams::new(0, 10);
    loop {
        let page = repository
            .get_paged(params, &Filter::all(), &Sort::ascending("_id"), None)
            .await?;
        println!(
            "page {}/{}: {:?}",
            page.page_index + 1,
            page.total_pages,
            page.items.iter().map(|order| *order.id()).collect::<Vec<_>>()
        );

        if !page.has_next_page() {
            break;
        }
        params.page_index += 1;
    }

    let failed = unit_of_work
        .run_in_transaction::<Order, (), _>(TransactionContext::new(cancellation.clone()), |repository, scope| {
            async move {
                repository
                    .delete_many(&Filter::eq("_t", "External"), Some(scope.session_mut()))
                    .await?;
                Err(UnitOfWorkError::Backend("simulated failure".to_string()))
            }
            .boxed()
        })
        .await;
    if let Err(error) = failed {
        warn!(%error, "transaction rolled back");
    }

    let external = repository
        .count(&Filter::eq("_t", "External"), None)
        .await?;
    println!("external orders after rollback: {}", external);

    unit_of_work.dispose().await;
    Ok(())
}

#[cfg(feature = "mongodb")]
async fn run() -> UnitOfWorkResult<()> {
    match std::env::var("UOWLAYER_CONFIG") {
        Ok(path) => {
            let settings = DatabaseSettings::load(path)?;
            let backend = uowlayer::mongodb::MongoBackend::connect(settings).await?;
            walkthrough(UnitOfWork::new(backend)).await
        }
        Err(_) => walkthrough(UnitOfWork::new(InMemoryStore::new())).await,
    }
}

#[cfg(not(feature = "mongodb"))]
async fn run() -> UnitOfWorkResult<()> {
    walkthrough(UnitOfWork::new(InMemoryStore::new())).await
}

#[tokio::main]
async fn main() -> UnitOfWorkResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run().await
}
