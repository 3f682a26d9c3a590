use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use ogen_db::BatchStore;
use ogen_runtime::ProductCache;
use ogen_schemas::{BatchStatus, OrderBatch};
use ogen_testkit::{sample_configuration, sample_settings, FakeRemote, Harness};

#[tokio::test(start_paused = true)]
async fn scenario_many_callers_one_lookup() {
    let remote = Arc::new(
        FakeRemote::new()
            .with_product("SKU-A", "11", "4.00")
            .with_lookup_latency(Duration::from_millis(100)),
    );
    let cache = Arc::new(ProductCache::new(remote.clone()));

    let handles = (0..32).map(|_| {
        let c = cache.clone();
        tokio::spawn(async move { c.resolve("SKU-A").await })
    });
    let got: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(got.iter().all(|p| p.as_ref().map(|p| p.variant_id.as_str()) == Some("11")));
    assert_eq!(remote.lookup_calls(), 1);
}

#[tokio::test]
async fn scenario_batch_run_resolves_each_sku_once() {
    let remote = FakeRemote::new()
        .with_product("SKU-A", "11", "4.00")
        .with_product("SKU-B", "12", "3.00");
    let h = Harness::new(remote, sample_settings());
    for id in ["r1", "r2"] {
        h.store
            .create_batch(OrderBatch::new_pending(id, None, 25))
            .await
            .unwrap();
        let s = h
            .orchestrator
            .run_batch(&sample_configuration(25), id)
            .await
            .unwrap();
        assert_eq!(s.status, BatchStatus::Completed);
    }
    // Two SKUs, two runs, hits are kept across runs.
    assert_eq!(h.remote.lookup_calls(), 2);
}

#[tokio::test]
async fn scenario_misses_are_retried_on_the_next_run() {
    let remote = FakeRemote::new().with_product("SKU-A", "11", "4.00");
    let h = Harness::new(remote, sample_settings());
    for id in ["m1", "m2"] {
        h.store
            .create_batch(OrderBatch::new_pending(id, None, 3))
            .await
            .unwrap();
        let s = h
            .orchestrator
            .run_batch(&sample_configuration(3), id)
            .await
            .unwrap();
        // The unresolved SKU-B falls back to a custom line item; orders still go out.
        assert_eq!(s.status, BatchStatus::Completed);
    }
    // SKU-A once; SKU-B once per run.
    assert_eq!(h.remote.lookup_calls(), 3);
}
