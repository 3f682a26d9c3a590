//! Per-batch order template.
//!
//! Everything that is identical across the orders of a batch (address, tags,
//! resolved line items, target location) is computed once in
//! [`OrderTemplate::build`]; [`OrderTemplate::payload_for`] then stamps out
//! one payload per order index.

use ogen_config::Settings;
use ogen_remote::{OrderPayload, PayloadCustomer, PayloadLineItem};
use ogen_schemas::{Address, CustomerInfo, OrderConfiguration};
use uuid::Uuid;

use crate::cache::ProductCache;

pub const BULK_TAG: &str = "qa-bulk";
const FALLBACK_PRICE: &str = "0.00";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("shipping address '{0}' is not in the address book")]
    UnknownAddress(String),
    #[error("configuration has no line items")]
    NoLineItems,
}

#[derive(Debug, Clone)]
pub struct OrderTemplate {
    pub line_items: Vec<PayloadLineItem>,
    pub shipping_address: Address,
    pub customer: CustomerInfo,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub randomize: bool,
    /// Remote location for the configured warehouse, when one is mapped.
    pub location_id: Option<String>,
    /// SKUs that fell back to a custom line item.
    pub unresolved: Vec<String>,
}

impl OrderTemplate {
    pub async fn build(
        config: &OrderConfiguration,
        batch_id: &str,
        settings: &Settings,
        cache: &ProductCache,
    ) -> Result<Self, TemplateError> {
        if config.line_items.is_empty() {
            return Err(TemplateError::NoLineItems);
        }

        let mut shipping_address = settings
            .addresses
            .get(&config.shipping_address)
            .cloned()
            .ok_or_else(|| TemplateError::UnknownAddress(config.shipping_address.clone()))?;
        if shipping_address.first_name.is_none() {
            shipping_address.first_name = Some(config.customer.first_name.clone());
        }
        if shipping_address.last_name.is_none() {
            shipping_address.last_name = Some(config.customer.last_name.clone());
        }

        let location_id = settings
            .warehouses
            .get(&config.warehouse)
            .map(|w| w.location_id.clone());
        if location_id.is_none() {
            tracing::warn!(
                batch_id,
                warehouse = %config.warehouse,
                "warehouse has no mapped location; orders keep the default location"
            );
        }

        let mut line_items = Vec::with_capacity(config.line_items.len());
        let mut unresolved = Vec::new();
        for li in &config.line_items {
            let item = match cache.resolve(&li.product_id).await {
                Some(p) => PayloadLineItem {
                    variant_id: Some(p.variant_id),
                    title: None,
                    sku: None,
                    price: None,
                    quantity: li.quantity,
                },
                None => {
                    unresolved.push(li.product_id.clone());
                    PayloadLineItem {
                        variant_id: None,
                        title: Some(li.product_id.clone()),
                        sku: Some(li.product_id.clone()),
                        price: Some(FALLBACK_PRICE.to_string()),
                        quantity: li.quantity,
                    }
                }
            };
            line_items.push(item);
        }

        Ok(Self {
            line_items,
            shipping_address,
            customer: config.customer.clone(),
            tags: assemble_tags(&config.custom_tags, batch_id, &config.warehouse),
            note: config.notes.clone(),
            randomize: config.randomize_data,
            location_id,
            unresolved,
        })
    }

    /// Payload for one order. `order_index` is 1-based.
    pub fn payload_for(&self, order_index: u32) -> OrderPayload {
        let customer = if self.randomize {
            randomized_customer(&self.customer, order_index)
        } else {
            self.customer.clone()
        };

        let mut address = self.shipping_address.clone();
        if self.randomize {
            address.last_name = Some(customer.last_name.clone());
        }

        OrderPayload {
            line_items: self.line_items.clone(),
            customer: PayloadCustomer {
                first_name: customer.first_name,
                last_name: customer.last_name,
                email: customer.email.clone(),
            },
            email: customer.email,
            shipping_address: address.clone(),
            billing_address: address,
            tags: self.tags.join(","),
            note: self.note.clone(),
            financial_status: "paid".to_string(),
            send_receipt: false,
            send_fulfillment_receipt: false,
            inventory_behaviour: "bypass".to_string(),
        }
    }
}

/// Custom tags (trimmed, de-duplicated, order kept), then the bulk marker,
/// the batch id and the warehouse.
fn assemble_tags(custom: &[String], batch_id: &str, warehouse: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let system = [
        BULK_TAG.to_string(),
        batch_id.to_string(),
        format!("warehouse-{warehouse}"),
    ];
    for t in custom.iter().map(|t| t.trim().to_string()).chain(system) {
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn randomized_customer(base: &CustomerInfo, order_index: u32) -> CustomerInfo {
    let token = Uuid::new_v4().simple().to_string();
    let token = &token[..8];
    let (local, domain) = base
        .email
        .rsplit_once('@')
        .unwrap_or((base.email.as_str(), "example.com"));
    let local = local.split('+').next().unwrap_or(local);
    CustomerInfo {
        first_name: base.first_name.clone(),
        last_name: format!("{}-{order_index}", base.last_name),
        email: format!("{local}+{token}@{domain}"),
    }
}
