use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on orders per batch unless settings override it.
pub const DEFAULT_MAX_ORDER_COUNT: u32 = 30_000;

/// Upper bound on the inter-order delay in seconds.
pub const DEFAULT_MAX_ORDER_DELAY_SECS: u32 = 60;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Bounds a configuration must respect. Carried in settings so deployments can
/// lower them; the defaults are the hard ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLimits {
    #[serde(default = "default_max_order_count")]
    pub max_order_count: u32,
    #[serde(default = "default_max_order_delay_secs")]
    pub max_order_delay_secs: u32,
}

fn default_max_order_count() -> u32 {
    DEFAULT_MAX_ORDER_COUNT
}

fn default_max_order_delay_secs() -> u32 {
    DEFAULT_MAX_ORDER_DELAY_SECS
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_order_count: DEFAULT_MAX_ORDER_COUNT,
            max_order_delay_secs: DEFAULT_MAX_ORDER_DELAY_SECS,
        }
    }
}

impl ConfigLimits {
    /// Clamp a requested order count into `[1, max_order_count]`.
    pub fn clamp_order_count(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_order_count.max(1))
    }
}

// ---------------------------------------------------------------------------
// Template parts
// ---------------------------------------------------------------------------

/// One line of the order template. `product_id` is usually a SKU; anything the
/// product lookup cannot resolve is sent through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: u32,
}

impl LineItem {
    pub fn new<S: Into<String>>(product_id: S, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Reusable template describing how to build every order of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfiguration {
    pub name: String,
    /// Warehouse code; mapped to a remote location id through settings.
    pub warehouse: String,
    /// Key into the address book held in settings.
    pub shipping_address: String,
    pub line_items: Vec<LineItem>,
    pub customer: CustomerInfo,
    #[serde(default)]
    pub custom_tags: Vec<String>,
    pub order_count: u32,
    /// Seconds to wait between waves (or between orders under the sequential policy).
    #[serde(default)]
    pub order_delay_secs: u32,
    #[serde(default)]
    pub randomize_data: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A configuration as persisted by the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    pub id: String,
    #[serde(flatten)]
    pub configuration: OrderConfiguration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("configuration field '{0}' must not be blank")]
    BlankField(&'static str),
    #[error("configuration must contain at least one line item")]
    NoLineItems,
    #[error("line item {index} ('{product_id}') has quantity 0")]
    ZeroQuantity { index: usize, product_id: String },
    #[error("order_count {got} is outside [1, {max}]")]
    OrderCountOutOfRange { got: u32, max: u32 },
    #[error("order_delay_secs {got} exceeds maximum {max}")]
    DelayOutOfRange { got: u32, max: u32 },
    #[error("customer email '{0}' is not well-formed")]
    InvalidEmail(String),
}

impl OrderConfiguration {
    /// Check the data-model invariants. Returns the first violation found.
    pub fn validate(&self, limits: &ConfigLimits) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankField("name"));
        }
        if self.warehouse.trim().is_empty() {
            return Err(ValidationError::BlankField("warehouse"));
        }
        if self.shipping_address.trim().is_empty() {
            return Err(ValidationError::BlankField("shipping_address"));
        }
        if self.line_items.is_empty() {
            return Err(ValidationError::NoLineItems);
        }
        for (index, li) in self.line_items.iter().enumerate() {
            if li.product_id.trim().is_empty() {
                return Err(ValidationError::BlankField("line_items.product_id"));
            }
            if li.quantity == 0 {
                return Err(ValidationError::ZeroQuantity {
                    index,
                    product_id: li.product_id.clone(),
                });
            }
        }
        if self.order_count == 0 || self.order_count > limits.max_order_count {
            return Err(ValidationError::OrderCountOutOfRange {
                got: self.order_count,
                max: limits.max_order_count,
            });
        }
        if self.order_delay_secs > limits.max_order_delay_secs {
            return Err(ValidationError::DelayOutOfRange {
                got: self.order_delay_secs,
                max: limits.max_order_delay_secs,
            });
        }
        if !is_well_formed_email(&self.customer.email) {
            return Err(ValidationError::InvalidEmail(self.customer.email.clone()));
        }
        Ok(())
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain with
/// no empty labels, no whitespace.
pub fn is_well_formed_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrderConfiguration {
        OrderConfiguration {
            name: "smoke".to_string(),
            warehouse: "WH-EAST".to_string(),
            shipping_address: "nyc".to_string(),
            line_items: vec![LineItem::new("SKU-1", 2)],
            customer: CustomerInfo {
                first_name: "Test".to_string(),
                last_name: "Buyer".to_string(),
                email: "qa@example.com".to_string(),
            },
            custom_tags: vec!["qa".to_string()],
            order_count: 5,
            order_delay_secs: 0,
            randomize_data: false,
            notes: None,
        }
    }

    #[test]
    fn valid_configuration_passes() {
        assert_eq!(sample().validate(&ConfigLimits::default()), Ok(()));
    }

    #[test]
    fn empty_line_items_rejected() {
        let mut c = sample();
        c.line_items.clear();
        assert_eq!(
            c.validate(&ConfigLimits::default()),
            Err(ValidationError::NoLineItems)
        );
    }

    #[test]
    fn order_count_bounds_enforced() {
        let limits = ConfigLimits::default();
        let mut c = sample();
        c.order_count = 0;
        assert!(matches!(
            c.validate(&limits),
            Err(ValidationError::OrderCountOutOfRange { got: 0, .. })
        ));
        c.order_count = DEFAULT_MAX_ORDER_COUNT + 1;
        assert!(c.validate(&limits).is_err());
        c.order_count = DEFAULT_MAX_ORDER_COUNT;
        assert!(c.validate(&limits).is_ok());
    }

    #[test]
    fn delay_bound_enforced() {
        let mut c = sample();
        c.order_delay_secs = DEFAULT_MAX_ORDER_DELAY_SECS + 1;
        assert!(matches!(
            c.validate(&ConfigLimits::default()),
            Err(ValidationError::DelayOutOfRange { .. })
        ));
    }

    #[test]
    fn zero_quantity_rejected() {
        let mut c = sample();
        c.line_items.push(LineItem::new("SKU-2", 0));
        assert_eq!(
            c.validate(&ConfigLimits::default()),
            Err(ValidationError::ZeroQuantity {
                index: 1,
                product_id: "SKU-2".to_string()
            })
        );
    }

    #[test]
    fn email_shapes() {
        assert!(is_well_formed_email("a@b.co"));
        assert!(is_well_formed_email("first.last+tag@sub.example.com"));
        assert!(!is_well_formed_email("no-at-sign.com"));
        assert!(!is_well_formed_email("@example.com"));
        assert!(!is_well_formed_email("a@localhost"));
        assert!(!is_well_formed_email("a@b..com"));
        assert!(!is_well_formed_email("a b@example.com"));
        assert!(!is_well_formed_email("a@b@example.com"));
    }

    #[test]
    fn clamp_order_count_stays_in_range() {
        let limits = ConfigLimits::default();
        assert_eq!(limits.clamp_order_count(0), 1);
        assert_eq!(limits.clamp_order_count(42), 42);
        assert_eq!(limits.clamp_order_count(u32::MAX), DEFAULT_MAX_ORDER_COUNT);
    }

    #[test]
    fn record_flattens_configuration_fields() {
        let now = Utc::now();
        let rec = ConfigurationRecord {
            id: "cfg-1".to_string(),
            configuration: sample(),
            created_at: now,
            updated_at: now,
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["id"], "cfg-1");
        assert_eq!(v["warehouse"], "WH-EAST");
        assert_eq!(v["order_count"], 5);
    }
}
