use std::sync::Arc;
use std::time::Duration;

use ogen_db::{BatchStore, StoreError};
use ogen_runtime::{BatchOrchestrator, OrchestratorError, ProductCache};
use ogen_schemas::{BatchStatus, OrderBatch};
use ogen_testkit::{sample_configuration, sample_settings, FakeRemote, Harness, ScriptedStore};

#[tokio::test]
async fn scenario_unknown_address_fails_before_any_order() {
    let h = Harness::new(FakeRemote::new(), sample_settings());
    h.store
        .create_batch(OrderBatch::new_pending("ba", None, 3))
        .await
        .unwrap();
    let mut cfg = sample_configuration(3);
    cfg.shipping_address = "nowhere".to_string();

    let err = h.orchestrator.run_batch(&cfg, "ba").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Template(_)));
    assert_eq!(h.remote.create_calls(), 0);

    let b = h.store.get_batch("ba").await.unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Failed);
    assert_eq!(b.progress, 100);
    assert_eq!(
        b.error_message.as_deref(),
        Some("shipping address 'nowhere' is not in the address book")
    );
}

#[tokio::test]
async fn scenario_missing_batch_record_is_an_error() {
    let h = Harness::new(FakeRemote::new(), sample_settings());
    let err = h
        .orchestrator
        .run_batch(&sample_configuration(3), "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(ref e) if e.is_not_found()));
    assert_eq!(h.remote.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_batch_deleted_mid_run_aborts() {
    let remote = FakeRemote::new().with_create_latency(Duration::from_millis(50));
    let h = Arc::new(Harness::new(remote, sample_settings()));
    h.store
        .create_batch(OrderBatch::new_pending("bv", None, 30))
        .await
        .unwrap();

    let runner = h.clone();
    let run = tokio::spawn(async move {
        runner
            .orchestrator
            .run_batch(&sample_configuration(30), "bv")
            .await
    });
    while h.remote.create_calls() < 10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(h.store.delete_batch("bv").await.unwrap());

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(ref e) if e.is_not_found()));
    assert_eq!(h.remote.create_calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn scenario_second_run_of_a_live_batch_is_refused() {
    let remote = FakeRemote::new().with_create_latency(Duration::from_millis(50));
    let h = Arc::new(Harness::new(remote, sample_settings()));
    h.store
        .create_batch(OrderBatch::new_pending("b2x", None, 20))
        .await
        .unwrap();

    let runner = h.clone();
    let run = tokio::spawn(async move {
        runner
            .orchestrator
            .run_batch(&sample_configuration(20), "b2x")
            .await
    });
    while h.remote.create_calls() < 10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let err = h
        .orchestrator
        .run_batch(&sample_configuration(20), "b2x")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(StoreError::InvalidTransition(_))));
    let b = h.store.get_batch("b2x").await.unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Processing, "refused run must not touch the batch");

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(h.remote.create_calls(), 20);

    let again = h
        .orchestrator
        .run_batch(&sample_configuration(20), "b2x")
        .await
        .unwrap_err();
    assert!(matches!(again, OrchestratorError::Store(StoreError::AlreadyTerminal { .. })));
    assert_eq!(h.remote.create_calls(), 20);
    let b = h.store.get_batch("b2x").await.unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Completed);
    assert_eq!(b.results.len(), 20);
}

#[tokio::test]
async fn scenario_aborted_run_keeps_orders_already_created() {
    let remote = Arc::new(FakeRemote::new());
    let store = Arc::new(ScriptedStore::new().fail_progress_after(1));
    let orchestrator = BatchOrchestrator::new(
        remote.clone(),
        store.clone(),
        Arc::new(ProductCache::new(remote.clone())),
        Arc::new(sample_settings()),
    );
    store
        .create_batch(OrderBatch::new_pending("bp", None, 30))
        .await
        .unwrap();

    let err = orchestrator
        .run_batch(&sample_configuration(30), "bp")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(StoreError::Backend(_))));
    // The second wave's progress write failed; no third wave was sent.
    assert_eq!(remote.create_calls(), 20);

    let b = store.get_batch("bp").await.unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Failed);
    assert_eq!(b.progress, 100);
    assert!(b
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("connection reset by peer")));
    assert_eq!(b.results.len(), 20);
    assert_eq!(b.created_orders().count(), 20);
}
