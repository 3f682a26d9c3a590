use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a successful remote create call. Opaque apart from the fields
/// echoed back into batch results and used for later deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    /// Human-readable order number (e.g. `"#1042"`).
    pub order_number: String,
    pub tags: String,
    /// Decimal string, exactly as returned by the remote API.
    pub total_price: String,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Resolved product variant for a SKU.
///
/// Prices stay decimal strings; this tool never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub variant_id: String,
    pub product_id: String,
    pub title: String,
    pub price: String,
}

/// Postal address held in the settings address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub province_code: Option<String>,
    pub country: String,
    #[serde(default)]
    pub country_code: Option<String>,
    pub zip: String,
    #[serde(default)]
    pub phone: Option<String>,
}
