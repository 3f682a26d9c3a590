use std::sync::Arc;
use std::time::Duration;

use ogen_db::{BatchStore, StoreError};
use ogen_schemas::{BatchStatus, CancelSignal, OrderBatch};
use ogen_testkit::{sample_configuration, sample_settings, FakeRemote, Harness};

#[tokio::test(start_paused = true)]
async fn scenario_cancel_during_first_wave_stops_after_it() {
    let remote = FakeRemote::new().with_create_latency(Duration::from_millis(50));
    let h = Arc::new(Harness::new(remote, sample_settings()));
    h.store
        .create_batch(OrderBatch::new_pending("bx", None, 30))
        .await
        .unwrap();

    let runner = h.clone();
    let run = tokio::spawn(async move {
        runner
            .orchestrator
            .run_batch(&sample_configuration(30), "bx")
            .await
    });

    // Wait until the first wave is in flight, then cancel out of band.
    while h.remote.create_calls() < 10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let pending = h.store.request_cancel("bx").await.unwrap();
    assert_eq!(pending.cancel_signal, CancelSignal::CancelRequested);

    let summary = run.await.unwrap().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.status, BatchStatus::Partial);
    assert_eq!(
        summary.message.as_deref(),
        Some("Cancelled by user - 10 of 30 orders created")
    );

    // The in-flight wave completes; nothing after it is issued.
    assert_eq!(h.remote.create_calls(), 10);
    assert_eq!(summary.results.len(), 10);

    let b = h.store.get_batch("bx").await.unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Partial);
    assert_eq!(b.cancel_signal, CancelSignal::Cancelled);
    assert_eq!(b.progress, 100);

    // Terminal batches refuse further cancel requests.
    assert!(matches!(
        h.store.request_cancel("bx").await,
        Err(StoreError::AlreadyTerminal { .. })
    ));
}

#[tokio::test]
async fn scenario_cancel_before_first_wave_creates_nothing() {
    let h = Harness::new(FakeRemote::new(), sample_settings());
    h.store
        .create_batch(OrderBatch::new_pending("b0", None, 5))
        .await
        .unwrap();
    h.store.request_cancel("b0").await.unwrap();

    let summary = h
        .orchestrator
        .run_batch(&sample_configuration(5), "b0")
        .await
        .unwrap();

    assert_eq!(h.remote.create_calls(), 0);
    assert_eq!(summary.status, BatchStatus::Failed);
    assert_eq!(summary.message.as_deref(), Some("Cancelled by user"));
    assert!(summary.results.is_empty());
}
