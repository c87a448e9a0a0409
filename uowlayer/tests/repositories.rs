mod common;

use std::sync::Arc;

use common::{Invoice, Order};
use uowlayer::{memory::InMemoryStore, prelude::*};

#[tokio::test]
async fn repositories_are_created_once_per_document_type() {
    let unit_of_work = UnitOfWork::new(InMemoryStore::new());

    let first = unit_of_work.get_repository::<Invoice>().await.unwrap();
    let second = unit_of_work.get_repository::<Invoice>().await.unwrap();
    let orders = unit_of_work.get_repository::<Order>().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.collection_name(), "invoice");
    assert_eq!(orders.collection_name(), "orderBase");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_share_one_repository() {
    let unit_of_work = Arc::new(UnitOfWork::new(InMemoryStore::new()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let unit_of_work = unit_of_work.clone();
            tokio::spawn(async move { unit_of_work.get_repository::<Invoice>().await })
        })
        .collect();

    let mut repositories = Vec::new();
    for handle in handles {
        repositories.push(handle.await.unwrap().unwrap());
    }

    assert!(repositories.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test]
async fn overrides_win_over_the_naming_convention() {
    let selector = OverrideCollectionNameSelector::new().with_override("OrderBase", "orders");
    let store = InMemoryStore::builder()
        .collection_name_selector(Arc::new(selector))
        .finish();
    let unit_of_work = UnitOfWork::new(store.clone());

    let orders = unit_of_work.get_repository::<Order>().await.unwrap();
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    assert_eq!(orders.collection_name(), "orders");
    assert_eq!(invoices.collection_name(), "invoice");

    let mut collections = store.list_collections().await;
    collections.sort();
    assert_eq!(collections, vec!["invoice", "orders"]);
}

#[tokio::test]
async fn empty_collection_names_are_configuration_errors() {
    let selector = OverrideCollectionNameSelector::new().with_override("Invoice", "");
    let store = InMemoryStore::builder()
        .collection_name_selector(Arc::new(selector))
        .finish();
    let unit_of_work = UnitOfWork::new(store);

    let result = unit_of_work.get_repository::<Invoice>().await;

    assert!(matches!(result, Err(UnitOfWorkError::Configuration(_))));
}

#[tokio::test]
async fn dispose_clears_the_cache_but_keeps_the_data() {
    let unit_of_work = UnitOfWork::new(InMemoryStore::new());
    let before = unit_of_work.get_repository::<Invoice>().await.unwrap();
    before.insert_one(&Invoice::new(1), None).await.unwrap();

    unit_of_work.dispose().await;
    let after = unit_of_work.get_repository::<Invoice>().await.unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.count(&Filter::all(), None).await.unwrap(), 1);
}

#[tokio::test]
async fn crud_operations_run_without_a_session() {
    let unit_of_work = UnitOfWork::new(InMemoryStore::new());
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    invoices
        .insert_many(&(1..=6).map(Invoice::new).collect::<Vec<_>>(), None)
        .await
        .unwrap();

    let replaced = invoices
        .replace_one(
            &Invoice {
                customer: "walk-in".to_string(),
                ..Invoice::new(3)
            },
            None,
        )
        .await
        .unwrap();
    let missing = invoices.replace_one(&Invoice::new(42), None).await.unwrap();
    let deleted = invoices
        .delete_many(&Filter::eq("customer", "customer-1"), None)
        .await
        .unwrap();
    let remaining = invoices
        .find(&Filter::all(), Some(&Sort::ascending("_id")), None)
        .await
        .unwrap();

    assert!(replaced);
    assert!(!missing);
    assert_eq!(deleted, 2);
    assert_eq!(
        remaining.iter().map(|invoice| invoice.id).collect::<Vec<_>>(),
        vec![2, 3, 5, 6]
    );
    assert_eq!(remaining[1].customer, "walk-in");
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let unit_of_work = UnitOfWork::new(InMemoryStore::new());
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();
    invoices.insert_one(&Invoice::new(1), None).await.unwrap();

    let result = invoices.insert_one(&Invoice::new(1), None).await;

    assert_eq!(
        result,
        Err(UnitOfWorkError::DocumentAlreadyExists(
            "1".to_string(),
            "invoice".to_string()
        ))
    );
}
