//! ogen-testkit
//!
//! Shared fixtures for scenario tests: an in-process [`FakeRemote`], a batch
//! store with scripted failures, sample settings/configurations and a
//! progress sink that records events.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ogen_config::{Settings, Warehouse};
use ogen_db::{BatchStore, InMemoryStore, StoreError};
use ogen_remote::{
    DeleteOutcome, FulfillmentOrder, OrderPayload, RemoteError, RemoteOrderService,
};
use ogen_runtime::{BatchOrchestrator, ProductCache, ProgressEvent, ProgressSink};
use ogen_schemas::{
    Address, BatchStatus, CustomerInfo, LineItem, OrderBatch, OrderConfiguration, OrderResult,
    ProductInfo, RemoteOrder,
};

pub const SAMPLE_LOCATION_ID: &str = "777";
pub const DEFAULT_LOCATION_ID: &str = "100";

// ---------------------------------------------------------------------------
// FakeRemote
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeState {
    products: HashMap<String, ProductInfo>,
    fail_create_calls: HashSet<u32>,
    fail_all_creates: bool,
    live_orders: HashSet<String>,
    gone: HashSet<String>,
    fail_deletes: HashSet<String>,
    deleted: Vec<String>,
    order_locations: HashMap<String, String>,
    move_error: Option<RemoteError>,
}

/// Scriptable in-process remote.
///
/// Create calls are numbered 1.. in the order they are first polled; a wave's
/// futures are polled in index order, so call `n` is order index `n` for
/// batches that start on a fresh fake.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
    create_latency: Duration,
    lookup_latency: Duration,
    create_calls: AtomicU32,
    lookup_calls: AtomicU32,
    delete_calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_product(self, sku: &str, variant_id: &str, price: &str) -> Self {
        self.state().products.insert(
            sku.to_string(),
            ProductInfo {
                variant_id: variant_id.to_string(),
                product_id: format!("p-{variant_id}"),
                title: format!("Product {sku}"),
                price: price.to_string(),
            },
        );
        self
    }

    pub fn fail_create_call(self, n: u32) -> Self {
        self.state().fail_create_calls.insert(n);
        self
    }

    pub fn fail_all_creates(self) -> Self {
        self.state().fail_all_creates = true;
        self
    }

    pub fn with_create_latency(mut self, d: Duration) -> Self {
        self.create_latency = d;
        self
    }

    pub fn with_lookup_latency(mut self, d: Duration) -> Self {
        self.lookup_latency = d;
        self
    }

    /// The remote answers 404 for this order id.
    pub fn mark_gone(&self, order_id: &str) {
        let mut s = self.state();
        s.live_orders.remove(order_id);
        s.gone.insert(order_id.to_string());
    }

    /// Register an order as existing remotely (for deletion fixtures).
    pub fn seed_order(&self, order_id: &str) {
        self.state().live_orders.insert(order_id.to_string());
    }

    pub fn fail_delete(&self, order_id: &str) {
        self.state().fail_deletes.insert(order_id.to_string());
    }

    pub fn fail_moves(self, e: RemoteError) -> Self {
        self.state().move_error = Some(e);
        self
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> u32 {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub fn location_of(&self, order_id: &str) -> Option<String> {
        self.state().order_locations.get(order_id).cloned()
    }
}

#[async_trait]
impl RemoteOrderService for FakeRemote {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<RemoteOrder, RemoteError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.create_latency.is_zero() {
            tokio::time::sleep(self.create_latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut s = self.state();
        if s.fail_all_creates || s.fail_create_calls.contains(&n) {
            return Err(RemoteError::Http {
                status: 422,
                message: format!("scripted failure for call {n}"),
            });
        }
        let id = (5000 + n).to_string();
        s.live_orders.insert(id.clone());
        s.order_locations
            .insert(id.clone(), DEFAULT_LOCATION_ID.to_string());
        Ok(RemoteOrder {
            id,
            order_number: format!("#{}", 1000 + n),
            tags: payload.tags.clone(),
            total_price: "10.00".to_string(),
            financial_status: Some(payload.financial_status.clone()),
            fulfillment_status: None,
            created_at: None,
        })
    }

    async fn delete_order(&self, order_id: &str) -> Result<DeleteOutcome, RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut s = self.state();
        if s.fail_deletes.contains(order_id) {
            return Err(RemoteError::Http {
                status: 500,
                message: "scripted delete failure".to_string(),
            });
        }
        if s.live_orders.remove(order_id) {
            s.deleted.push(order_id.to_string());
            Ok(DeleteOutcome::deleted())
        } else {
            Ok(DeleteOutcome::already_gone())
        }
    }

    async fn search_product_by_sku(&self, sku: &str) -> Result<Option<ProductInfo>, RemoteError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if !self.lookup_latency.is_zero() {
            tokio::time::sleep(self.lookup_latency).await;
        }
        Ok(self.state().products.get(sku).cloned())
    }

    async fn get_fulfillment_orders(
        &self,
        order_id: &str,
    ) -> Result<Vec<FulfillmentOrder>, RemoteError> {
        let s = self.state();
        Ok(s.order_locations
            .get(order_id)
            .map(|loc| {
                vec![FulfillmentOrder {
                    id: format!("9{order_id}"),
                    assigned_location_id: Some(loc.clone()),
                    status: "open".to_string(),
                }]
            })
            .unwrap_or_default())
    }

    async fn move_fulfillment_order(
        &self,
        fulfillment_order_id: &str,
        location_id: &str,
    ) -> Result<(), RemoteError> {
        let mut s = self.state();
        if let Some(e) = &s.move_error {
            return Err(e.clone());
        }
        let order_id = fulfillment_order_id
            .strip_prefix('9')
            .unwrap_or(fulfillment_order_id)
            .to_string();
        s.order_locations.insert(order_id, location_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedStore
// ---------------------------------------------------------------------------

/// [`InMemoryStore`] whose writes can be made to fail with a backend error.
pub struct ScriptedStore {
    inner: InMemoryStore,
    fail_deletes: AtomicBool,
    progress_writes_left: AtomicU32,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_deletes: AtomicBool::new(false),
            progress_writes_left: AtomicU32::new(u32::MAX),
        }
    }
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(self) -> Self {
        self.fail_deletes.store(true, Ordering::SeqCst);
        self
    }

    /// Progress writes after the first `n` fail.
    pub fn fail_progress_after(self, n: u32) -> Self {
        self.progress_writes_left.store(n, Ordering::SeqCst);
        self
    }

    fn backend_down() -> StoreError {
        StoreError::Backend("connection reset by peer".to_string())
    }
}

#[async_trait]
impl BatchStore for ScriptedStore {
    async fn create_batch(&self, batch: OrderBatch) -> Result<(), StoreError> {
        self.inner.create_batch(batch).await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<OrderBatch>, StoreError> {
        self.inner.get_batch(batch_id).await
    }

    async fn list_batches(&self) -> Result<Vec<OrderBatch>, StoreError> {
        self.inner.list_batches().await
    }

    async fn claim_batch(&self, batch_id: &str) -> Result<(), StoreError> {
        self.inner.claim_batch(batch_id).await
    }

    async fn update_progress(
        &self,
        batch_id: &str,
        progress: u8,
        status: Option<BatchStatus>,
    ) -> Result<(), StoreError> {
        let allowed = self
            .progress_writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(Self::backend_down());
        }
        self.inner.update_progress(batch_id, progress, status).await
    }

    async fn append_results(
        &self,
        batch_id: &str,
        results: &[OrderResult],
    ) -> Result<(), StoreError> {
        self.inner.append_results(batch_id, results).await
    }

    async fn finalize(
        &self,
        batch_id: &str,
        results: Vec<OrderResult>,
        message: Option<String>,
        status: BatchStatus,
    ) -> Result<OrderBatch, StoreError> {
        self.inner.finalize(batch_id, results, message, status).await
    }

    async fn request_cancel(&self, batch_id: &str) -> Result<OrderBatch, StoreError> {
        self.inner.request_cancel(batch_id).await
    }

    async fn delete_batch(&self, batch_id: &str) -> Result<bool, StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::backend_down());
        }
        self.inner.delete_batch(batch_id).await
    }

    async fn unlink_configuration(&self, configuration_id: &str) -> Result<u64, StoreError> {
        self.inner.unlink_configuration(configuration_id).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn sample_address() -> Address {
    Address {
        first_name: None,
        last_name: None,
        company: Some("QA".to_string()),
        address1: "1 Test Way".to_string(),
        address2: None,
        city: "Springfield".to_string(),
        province: Some("Illinois".to_string()),
        province_code: Some("IL".to_string()),
        country: "United States".to_string(),
        country_code: Some("US".to_string()),
        zip: "62701".to_string(),
        phone: None,
    }
}

/// Defaults plus one address (`home`) and one mapped warehouse (`WH1`).
pub fn sample_settings() -> Settings {
    let mut s = Settings::default();
    s.addresses.insert("home".to_string(), sample_address());
    s.warehouses.insert(
        "WH1".to_string(),
        Warehouse {
            location_id: SAMPLE_LOCATION_ID.to_string(),
            name: Some("Main".to_string()),
        },
    );
    s.deletion.wave_delay_ms = 0;
    s
}

pub fn sample_configuration(order_count: u32) -> OrderConfiguration {
    OrderConfiguration {
        name: "scenario".to_string(),
        warehouse: "WH1".to_string(),
        shipping_address: "home".to_string(),
        line_items: vec![LineItem::new("SKU-A", 1), LineItem::new("SKU-B", 2)],
        customer: CustomerInfo {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
        },
        custom_tags: vec!["scenario".to_string()],
        order_count,
        order_delay_secs: 0,
        randomize_data: false,
        notes: None,
    }
}

/// Progress sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(attempted, progress)` of every progress event, in order.
    pub fn progress_points(&self) -> Vec<(u32, u8)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress {
                    attempted,
                    progress,
                    ..
                } => Some((attempted, progress)),
                ProgressEvent::Finished { .. } => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Everything a scenario needs to run a batch against a fake.
pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<ProductCache>,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn new(remote: FakeRemote, settings: Settings) -> Self {
        let remote = Arc::new(remote);
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(ProductCache::new(remote.clone()));
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = BatchOrchestrator::new(
            remote.clone(),
            store.clone(),
            cache.clone(),
            Arc::new(settings),
        )
        .with_progress_sink(sink.clone());
        Self {
            remote,
            store,
            cache,
            sink,
            orchestrator,
        }
    }
}
