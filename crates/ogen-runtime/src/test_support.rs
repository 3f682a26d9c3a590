use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ogen_remote::{
    DeleteOutcome, FulfillmentOrder, OrderPayload, RemoteError, RemoteOrderService,
};
use ogen_schemas::{ProductInfo, RemoteOrder};

/// Minimal remote for unit tests: product lookups and fulfillment orders.
/// Order create/delete live in `ogen-testkit`'s fake.
#[derive(Default)]
pub struct ScriptedRemote {
    products: HashMap<String, ProductInfo>,
    lookup_errors: HashSet<String>,
    lookups: Mutex<HashMap<String, usize>>,
    fulfillment: HashMap<String, Vec<FulfillmentOrder>>,
    move_error: Option<RemoteError>,
    pub moves: Mutex<Vec<(String, String)>>,
}

impl ScriptedRemote {
    pub fn with_product(mut self, sku: &str, variant_id: &str) -> Self {
        self.products.insert(
            sku.to_string(),
            ProductInfo {
                variant_id: variant_id.to_string(),
                product_id: format!("p{variant_id}"),
                title: format!("Product {sku}"),
                price: "12.50".to_string(),
            },
        );
        self
    }

    pub fn with_lookup_error(mut self, sku: &str) -> Self {
        self.lookup_errors.insert(sku.to_string());
        self
    }

    pub fn with_fulfillment(mut self, order_id: &str, fos: Vec<FulfillmentOrder>) -> Self {
        self.fulfillment.insert(order_id.to_string(), fos);
        self
    }

    pub fn with_move_error(mut self, e: RemoteError) -> Self {
        self.move_error = Some(e);
        self
    }

    pub fn lookups_for(&self, sku: &str) -> usize {
        self.lookups
            .lock()
            .unwrap()
            .get(sku)
            .copied()
            .unwrap_or(0)
    }
}

pub fn fo(id: &str, location: Option<&str>) -> FulfillmentOrder {
    FulfillmentOrder {
        id: id.to_string(),
        assigned_location_id: location.map(str::to_string),
        status: "open".to_string(),
    }
}

#[async_trait]
impl RemoteOrderService for ScriptedRemote {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create_order(&self, _payload: &OrderPayload) -> Result<RemoteOrder, RemoteError> {
        Err(RemoteError::Api("create not scripted".into()))
    }

    async fn delete_order(&self, _order_id: &str) -> Result<DeleteOutcome, RemoteError> {
        Err(RemoteError::Api("delete not scripted".into()))
    }

    async fn search_product_by_sku(&self, sku: &str) -> Result<Option<ProductInfo>, RemoteError> {
        *self
            .lookups
            .lock()
            .unwrap()
            .entry(sku.to_string())
            .or_default() += 1;
        // Give concurrent callers a chance to pile up on the same key.
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.lookup_errors.contains(sku) {
            return Err(RemoteError::Transport("lookup down".into()));
        }
        Ok(self.products.get(sku).cloned())
    }

    async fn get_fulfillment_orders(
        &self,
        order_id: &str,
    ) -> Result<Vec<FulfillmentOrder>, RemoteError> {
        Ok(self.fulfillment.get(order_id).cloned().unwrap_or_default())
    }

    async fn move_fulfillment_order(
        &self,
        fulfillment_order_id: &str,
        location_id: &str,
    ) -> Result<(), RemoteError> {
        if let Some(e) = &self.move_error {
            return Err(e.clone());
        }
        self.moves
            .lock()
            .unwrap()
            .push((fulfillment_order_id.to_string(), location_id.to_string()));
        Ok(())
    }
}
