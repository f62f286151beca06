use common::OrderId;
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A compare-and-swap update lost a race.
    /// The expected record version did not match the stored version.
    #[error("version conflict on {entity} {id}: expected {expected}, found {actual}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// An order status update found the order in a different state than the
    /// caller observed.
    #[error("order {order} is {actual}, expected {expected}")]
    StatusConflict {
        order: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A stock reservation exceeds the available quantity.
    /// The product is left unmodified.
    #[error("insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        sku: String,
        requested: u32,
        available: u32,
    },

    /// A release would drive the reserved count negative. Callers must never
    /// release more than they reserved.
    #[error("release of {requested} exceeds reserved {reserved} for {sku}")]
    ReleaseExceedsReserved {
        sku: String,
        requested: u32,
        reserved: u32,
    },

    /// A shipping label already exists for the order.
    #[error("shipping label already exists for order {0}")]
    DuplicateLabel(OrderId),

    /// The tracking number collides with an existing label.
    #[error("duplicate tracking number: {0}")]
    DuplicateTrackingNumber(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
