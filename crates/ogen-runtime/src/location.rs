//! Warehouse location assignment for freshly created orders.
//!
//! Strategies run in order; the first one that succeeds wins. When every
//! strategy fails the last error is returned as a warning string and stored on
//! the created-order result. The order itself still counts as created.

use async_trait::async_trait;
use ogen_remote::{FulfillmentOrder, RemoteError, RemoteOrderService};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("order {order_id} has no fulfillment orders")]
    NoFulfillmentOrders { order_id: String },
    #[error("order {order_id} is not at location {location_id}")]
    NotAtLocation {
        order_id: String,
        location_id: String,
    },
}

#[async_trait]
pub trait LocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn assign(
        &self,
        remote: &dyn RemoteOrderService,
        order_id: &str,
        location_id: &str,
    ) -> Result<(), LocationError>;
}

async fn fulfillment_orders(
    remote: &dyn RemoteOrderService,
    order_id: &str,
) -> Result<Vec<FulfillmentOrder>, LocationError> {
    let fos = remote.get_fulfillment_orders(order_id).await?;
    if fos.is_empty() {
        return Err(LocationError::NoFulfillmentOrders {
            order_id: order_id.to_string(),
        });
    }
    Ok(fos)
}

/// Succeeds when the remote already routed every fulfillment order to the
/// target location.
#[derive(Debug, Default)]
pub struct AlreadyAtLocation;

#[async_trait]
impl LocationStrategy for AlreadyAtLocation {
    fn name(&self) -> &'static str {
        "already_at_location"
    }

    async fn assign(
        &self,
        remote: &dyn RemoteOrderService,
        order_id: &str,
        location_id: &str,
    ) -> Result<(), LocationError> {
        let fos = fulfillment_orders(remote, order_id).await?;
        if fos
            .iter()
            .all(|fo| fo.assigned_location_id.as_deref() == Some(location_id))
        {
            Ok(())
        } else {
            Err(LocationError::NotAtLocation {
                order_id: order_id.to_string(),
                location_id: location_id.to_string(),
            })
        }
    }
}

/// Moves every fulfillment order that is elsewhere.
#[derive(Debug, Default)]
pub struct MoveFulfillmentOrders;

#[async_trait]
impl LocationStrategy for MoveFulfillmentOrders {
    fn name(&self) -> &'static str {
        "move_fulfillment_orders"
    }

    async fn assign(
        &self,
        remote: &dyn RemoteOrderService,
        order_id: &str,
        location_id: &str,
    ) -> Result<(), LocationError> {
        let fos = fulfillment_orders(remote, order_id).await?;
        for fo in fos
            .iter()
            .filter(|fo| fo.assigned_location_id.as_deref() != Some(location_id))
        {
            remote.move_fulfillment_order(&fo.id, location_id).await?;
        }
        Ok(())
    }
}

pub struct LocationChain {
    strategies: Vec<Box<dyn LocationStrategy>>,
}

impl Default for LocationChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(AlreadyAtLocation),
            Box::new(MoveFulfillmentOrders),
        ])
    }
}

impl LocationChain {
    pub fn new(strategies: Vec<Box<dyn LocationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run the chain. `None` on success, otherwise the last failure message.
    pub async fn assign(
        &self,
        remote: &dyn RemoteOrderService,
        order_id: &str,
        location_id: &str,
    ) -> Option<String> {
        let mut last_err: Option<String> = None;
        for s in &self.strategies {
            match s.assign(remote, order_id, location_id).await {
                Ok(()) => {
                    tracing::debug!(order_id, location_id, strategy = s.name(), "location assigned");
                    return None;
                }
                Err(e) => {
                    tracing::debug!(order_id, strategy = s.name(), error = %e, "location strategy failed");
                    last_err = Some(e.to_string());
                }
            }
        }
        if let Some(msg) = &last_err {
            tracing::warn!(order_id, location_id, warning = %msg, "location assignment failed");
        }
        last_err
    }
}
