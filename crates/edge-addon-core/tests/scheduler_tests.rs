//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "integration-tests"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Single open transaction gate tests."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
mod support;

use std::sync::Arc;
use std::time::Duration;

use edge_addon_common::LifecycleConfig;
use edge_addon_core::{LifecycleError, Operation, TransactionScheduler, Tx, TxContext};
use support::Fakes;
use tokio::time::{sleep, timeout};

#[tokio::test(flavor = "multi_thread")]
async fn second_transaction_is_rejected_until_commit() {
    let fakes = Fakes::new();
    let scheduler = TransactionScheduler::new();
    let ctx = TxContext::background();

    assert!(!scheduler.is_transaction_open());
    let tx = scheduler.create_transaction(&ctx, fakes.service()).unwrap();
    assert!(scheduler.is_transaction_open());

    let err = scheduler
        .create_transaction(&ctx, fakes.service())
        .unwrap_err();
    assert!(matches!(err, LifecycleError::TxAlreadyOpen));

    tx.commit().unwrap();
    assert!(!scheduler.is_transaction_open());
    let next = scheduler.create_transaction(&ctx, fakes.service()).unwrap();
    assert_ne!(next.id(), tx.id());
}

#[tokio::test(flavor = "multi_thread")]
async fn rollback_frees_the_slot() {
    let fakes = Fakes::new();
    let scheduler = TransactionScheduler::new();
    let ctx = TxContext::background();

    let tx = scheduler.create_transaction(&ctx, fakes.service()).unwrap();
    tx.rollback().await.unwrap();

    scheduler.create_transaction(&ctx, fakes.service()).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_transaction_frees_the_slot() {
    let fakes = Fakes::new();
    let scheduler = TransactionScheduler::with_transaction_timeout(Duration::from_millis(30));
    let ctx = TxContext::background();

    let tx = scheduler.create_transaction(&ctx, fakes.service()).unwrap();
    assert!(tx.context().deadline().is_some());

    timeout(Duration::from_secs(2), async {
        while scheduler.is_transaction_open() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("transaction expires");
    scheduler.create_transaction(&ctx, fakes.service()).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_requests_open_exactly_one_transaction() {
    let fakes = Fakes::new();
    let scheduler = Arc::new(TransactionScheduler::new());
    let ctx = TxContext::background();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let scheduler = Arc::clone(&scheduler);
        let ctx = ctx.clone();
        let service = fakes.service();
        handles.push(tokio::spawn(async move {
            scheduler.create_transaction(&ctx, service).is_ok()
        }));
    }
    let mut opened = 0;
    for handle in handles {
        if handle.await.unwrap() {
            opened += 1;
        }
    }
    assert_eq!(opened, 1);
}

#[test]
fn transaction_outside_a_runtime_is_refused() {
    let fakes = Fakes::new();
    let scheduler = TransactionScheduler::with_transaction_timeout(Duration::from_secs(5));

    let err = scheduler
        .create_transaction(&TxContext::background(), fakes.service())
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NoRuntime));
    assert!(!scheduler.is_transaction_open());
    assert!(scheduler.get_transaction().is_none());

    let err = Tx::begin(&TxContext::background(), fakes.service()).unwrap_err();
    assert!(matches!(err, LifecycleError::NoRuntime));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_queries_go_through_the_stored_transaction() {
    let fakes = Fakes::new();
    let scheduler = TransactionScheduler::from_config(&LifecycleConfig::default());
    let ctx = TxContext::background();
    assert!(scheduler.get_transaction().is_none());

    let tx = scheduler.create_transaction(&ctx, fakes.service()).unwrap();
    tx.set_affected("node-red", "Node-RED", Operation::Installing);

    let stored = scheduler.get_transaction().expect("stored transaction");
    assert_eq!(stored.id(), tx.id());
    let affected = scheduler.affected_add_on("node-red").expect("affected");
    assert_eq!(affected.operation, Operation::Installing);
    assert!(scheduler.affected_add_on("grafana").is_none());

    tx.commit().unwrap();
    assert!(scheduler.affected_add_on("node-red").is_none());
}
