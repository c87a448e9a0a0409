use futures::FutureExt;
use std::thread;
use std::time::{Duration, Instant};

use uowlayer::{memory::InMemoryStore, prelude::*};

fn fast_backoff() -> ReadinessProber {
    ReadinessProber::new(Backoff::new(Duration::from_millis(1), Duration::from_millis(8)))
}

#[tokio::test]
async fn waits_until_a_primary_is_elected() {
    let store = InMemoryStore::builder().ready_after(3).finish();
    let unit_of_work = UnitOfWork::new(store.clone()).with_prober(fast_backoff());

    unit_of_work
        .ensure_replica_set_ready(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.probe_attempts(), 4);
}

#[tokio::test]
async fn transactions_work_once_ready() {
    let store = InMemoryStore::builder().ready_after(2).finish();
    let unit_of_work = UnitOfWork::new(store).with_prober(fast_backoff());

    unit_of_work
        .ensure_replica_set_ready(&CancellationToken::new())
        .await
        .unwrap();
    let session = unit_of_work.get_session().await.unwrap();

    let result = unit_of_work
        .run_in_transaction::<Ping, _, _>(
            TransactionContext::new(CancellationToken::new()).with_session(session),
            |_, scope| async move { Ok(scope.session().in_transaction()) }.boxed(),
        )
        .await;

    assert_eq!(result, Ok(true));
}

#[tokio::test]
async fn cancellation_ends_an_endless_wait() {
    let store = InMemoryStore::builder().standalone(true).finish();
    let unit_of_work = UnitOfWork::new(store.clone()).with_prober(fast_backoff());
    let cancellation = CancellationToken::new();

    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = unit_of_work.ensure_replica_set_ready(&cancellation).await;

    assert_eq!(result, Err(UnitOfWorkError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(store.probe_attempts() > 1);
}

#[test]
fn blocking_wait_retries_until_ready() {
    let store = InMemoryStore::builder().ready_after(2).finish();
    let unit_of_work = UnitOfWork::new(store.clone()).with_prober(fast_backoff());

    unit_of_work
        .ensure_replica_set_ready_blocking(&CancellationToken::new())
        .unwrap();

    assert_eq!(store.probe_attempts(), 3);
}

#[test]
fn blocking_wait_observes_cancellation() {
    let store = InMemoryStore::builder().standalone(true).finish();
    let prober = ReadinessProber::new(Backoff::new(Duration::from_secs(60), Duration::from_secs(60)));
    let unit_of_work = UnitOfWork::new(store).with_prober(prober);
    let cancellation = CancellationToken::new();

    let trigger = cancellation.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        trigger.cancel();
    });

    let started = Instant::now();
    let result = unit_of_work.ensure_replica_set_ready_blocking(&cancellation);
    canceller.join().unwrap();

    assert_eq!(result, Err(UnitOfWorkError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Document)]
struct Ping {
    #[serde(rename = "_id")]
    id: i32,
}
