use ogen_schemas::Address;
use serde::{Deserialize, Serialize};

/// One line of the create-order request.
///
/// Resolved products send `variant_id`; unresolved SKUs fall back to a custom
/// line item carrying `title`/`sku`/`price` so the call still goes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadLineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Body of `POST /orders.json` (wrapped as `{"order": ...}` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub line_items: Vec<PayloadLineItem>,
    pub customer: PayloadCustomer,
    pub email: String,
    pub shipping_address: Address,
    pub billing_address: Address,
    /// Comma-joined.
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub financial_status: String,
    pub send_receipt: bool,
    pub send_fulfillment_receipt: bool,
    pub inventory_behaviour: String,
}
