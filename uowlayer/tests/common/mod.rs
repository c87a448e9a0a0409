#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use uowlayer::{memory::InMemoryStore, prelude::*};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: i32,
    pub customer: String,
    pub total: i64,
}

impl Invoice {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            customer: format!("customer-{}", id % 3),
            total: i64::from(id) * 10,
        }
    }
}

/// Orders of every kind share one collection, discriminated by `_t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_t")]
pub enum Order {
    Internal {
        #[serde(rename = "_id")]
        id: i32,
        department: String,
    },
    External {
        #[serde(rename = "_id")]
        id: i32,
        customer: String,
    },
}

impl uowlayer::document::Document for Order {
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

/// A unit of work over a fresh in-memory store holding invoices 1..=count.
pub async fn seeded(count: i32) -> UnitOfWork<InMemoryStore> {
    let unit_of_work = UnitOfWork::new(InMemoryStore::new());
    let invoices: Vec<Invoice> = (1..=count).map(Invoice::new).collect();

    unit_of_work
        .get_repository::<Invoice>()
        .await
        .unwrap()
        .insert_many(&invoices, None)
        .await
        .unwrap();

    unit_of_work
}

pub fn ids(invoices: &[Invoice]) -> Vec<i32> {
    invoices.iter().map(|invoice| invoice.id).collect()
}
