mod common;

use futures::FutureExt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use common::{Invoice, Order, seeded};
use uowlayer::{memory::InMemoryStore, prelude::*};

async fn invoice_count(unit_of_work: &UnitOfWork<InMemoryStore>) -> u64 {
    unit_of_work
        .get_repository::<Invoice>()
        .await
        .unwrap()
        .count(&Filter::all(), None)
        .await
        .unwrap()
}

#[tokio::test]
async fn successful_operations_commit() {
    let unit_of_work = seeded(3).await;

    let inserted = unit_of_work
        .use_transaction::<Invoice, _, _>(
            |repository, session, _| {
                async move {
                    repository.insert_one(&Invoice::new(4), Some(&mut *session)).await?;
                    repository.insert_one(&Invoice::new(5), Some(session)).await?;
                    Ok(2)
                }
                .boxed()
            },
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(invoice_count(&unit_of_work).await, 5);
}

#[tokio::test]
async fn writes_stay_invisible_until_commit() {
    let unit_of_work = seeded(3).await;

    let (inside, outside) = unit_of_work
        .use_transaction::<Invoice, _, _>(
            |repository, session, _| {
                async move {
                    repository.insert_one(&Invoice::new(4), Some(&mut *session)).await?;

                    let inside = repository.count(&Filter::all(), Some(session)).await?;
                    let outside = repository.count(&Filter::all(), None).await?;
                    Ok((inside, outside))
                }
                .boxed()
            },
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!((inside, outside), (4, 3));
    assert_eq!(invoice_count(&unit_of_work).await, 4);
}

#[tokio::test]
async fn failed_operations_roll_back_and_keep_their_error() {
    let unit_of_work = seeded(3).await;
    let before = invoice_count(&unit_of_work).await;

    let result = unit_of_work
        .use_transaction::<Invoice, (), _>(
            |repository, session, _| {
                async move {
                    repository.insert_one(&Invoice::new(4), Some(&mut *session)).await?;
                    repository
                        .delete_many(&Filter::lt("_id", 3), Some(session))
                        .await?;
                    Err(UnitOfWorkError::Backend("payment declined".to_string()))
                }
                .boxed()
            },
            None,
            None,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(
        result,
        Err(UnitOfWorkError::Backend("payment declined".to_string()))
    );
    assert_eq!(invoice_count(&unit_of_work).await, before);
}

#[tokio::test]
async fn duplicate_ids_abort_the_whole_transaction() {
    let unit_of_work = seeded(3).await;

    let result = unit_of_work
        .use_transaction::<Invoice, (), _>(
            |repository, session, _| {
                async move {
                    repository
                        .insert_many(&[Invoice::new(10), Invoice::new(2)], Some(session))
                        .await
                }
                .boxed()
            },
            None,
            None,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(UnitOfWorkError::DocumentAlreadyExists(_, _))));
    assert_eq!(invoice_count(&unit_of_work).await, 3);
}

#[tokio::test]
async fn standalone_stores_fail_fast_without_running_the_operation() {
    let unit_of_work = UnitOfWork::new(InMemoryStore::builder().standalone(true).finish());
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let result = unit_of_work
        .use_transaction::<Invoice, (), _>(
            move |_, _, _| {
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            },
            None,
            None,
            &CancellationToken::new(),
        )
        .await;

    assert!(result.unwrap_err().is_not_supported());
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancellation_aborts_a_running_operation() {
    let unit_of_work = seeded(3).await;
    let cancellation = CancellationToken::new();

    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = unit_of_work
        .use_transaction::<Invoice, (), _>(
            |repository, session, _| {
                async move {
                    repository.insert_one(&Invoice::new(4), Some(session)).await?;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
                .boxed()
            },
            None,
            None,
            &cancellation,
        )
        .await;

    assert_eq!(result, Err(UnitOfWorkError::Cancelled));
    assert_eq!(invoice_count(&unit_of_work).await, 3);
}

#[tokio::test]
async fn cancelled_tokens_fail_before_starting() {
    let unit_of_work = seeded(3).await;
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let result = unit_of_work
        .run_in_transaction::<Invoice, (), _>(TransactionContext::new(cancellation), |_, _| {
            async move { Ok(()) }.boxed()
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn operations_observe_the_cancellation_token() {
    let unit_of_work = seeded(3).await;
    let cancellation = CancellationToken::new();

    let result = unit_of_work
        .use_transaction::<Invoice, (), _>(
            |_, _, token| {
                async move {
                    token.cancel();
                    token.cancelled().await;
                    Err(UnitOfWorkError::Cancelled)
                }
                .boxed()
            },
            None,
            None,
            &cancellation,
        )
        .await;

    assert_eq!(result, Err(UnitOfWorkError::Cancelled));
    assert!(cancellation.is_cancelled());
}

#[tokio::test]
async fn scopes_carry_options_state_and_session() {
    let unit_of_work = seeded(3).await;
    let session = unit_of_work.get_session().await.unwrap();
    let session_id = session.id();
    let options = TransactionOptions::new()
        .with_read_concern(ReadConcernLevel::Majority)
        .with_write_concern(WriteConcernLevel::Nodes(2));

    let context = TransactionContext::new(CancellationToken::new())
        .with_options(options.clone())
        .with_session(session);

    let (state, seen_id, seen_options) = unit_of_work
        .run_in_transaction::<Invoice, _, _>(context, |repository, scope| {
            async move {
                repository
                    .replace_one(
                        &Invoice {
                            total: 999,
                            ..Invoice::new(2)
                        },
                        Some(scope.session_mut()),
                    )
                    .await?;

                Ok((scope.state(), scope.session().id(), scope.options().clone()))
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(state, TransactionState::OperationRunning);
    assert_eq!(seen_id, session_id);
    assert_eq!(seen_options, options);

    let updated = unit_of_work
        .get_repository::<Invoice>()
        .await
        .unwrap()
        .find(&Filter::eq("_id", 2), None, None)
        .await
        .unwrap();
    assert_eq!(updated[0].total, 999);
}

#[tokio::test]
async fn caller_supplied_repositories_join_the_transaction() {
    let store = InMemoryStore::new();
    let unit_of_work = UnitOfWork::new(store.clone());
    let orders = store.create_repository::<Order>().await.unwrap();

    unit_of_work
        .use_transaction_with::<Order, _, _>(
            &orders,
            |repository, session, _| {
                async move {
                    repository
                        .insert_many(
                            &[
                                Order::Internal {
                                    id: 1,
                                    department: "finance".to_string(),
                                },
                                Order::External {
                                    id: 2,
                                    customer: "acme".to_string(),
                                },
                            ],
                            Some(session),
                        )
                        .await
                }
                .boxed()
            },
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let external = unit_of_work
        .run_in_transaction_with::<Order, _, _>(&orders, TransactionContext::default(), |repository, scope| {
            async move {
                repository
                    .find(&Filter::eq("_t", "External"), None, Some(scope.session_mut()))
                    .await
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(
        external,
        vec![Order::External {
            id: 2,
            customer: "acme".to_string(),
        }]
    );
}
