//! ogen-schemas
//!
//! Shared data model for the order generator: order configurations (templates),
//! batch records and their per-order results, and the remote-facing value types
//! echoed back from the commerce API.
//!
//! No IO lives here. Storage and network crates depend on these types.

mod batch;
mod configuration;
mod remote;

pub use batch::{
    new_batch_id, BatchStatus, CancelSignal, CreatedOrder, FailedOrder, OrderBatch, OrderResult,
};
pub use configuration::{
    is_well_formed_email, ConfigLimits, ConfigurationRecord, CustomerInfo, LineItem,
    OrderConfiguration, ValidationError, DEFAULT_MAX_ORDER_COUNT, DEFAULT_MAX_ORDER_DELAY_SECS,
};
pub use remote::{Address, ProductInfo, RemoteOrder};
