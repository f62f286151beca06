//! Workflow error types.

use store::{OrderStatus, StoreError};
use thiserror::Error;

/// Errors surfaced by workflow operations.
///
/// All are synchronous and descriptive; the workflow itself never retries.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The order, product, pick list, packing task, or label does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation was attempted outside its required order status.
    #[error("order must be {required} (currently {actual})")]
    InvalidState {
        required: String,
        actual: OrderStatus,
    },

    /// A reservation exceeds the available quantity. Nothing was mutated.
    #[error("insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        sku: String,
        requested: u32,
        available: u32,
    },

    /// The SKU is absent from its checklist, or every matching entry has
    /// already been processed.
    #[error("item {sku} not found or already processed")]
    ItemNotFound { sku: String },

    /// Packing completion was refused because verification is enforced and
    /// incomplete.
    #[error("packing verification incomplete: {verified} of {total} items verified")]
    PackingIncomplete { verified: usize, total: usize },

    /// A shipping label was already minted for the order.
    #[error("shipping label already issued for order {order_number}")]
    LabelAlreadyIssued { order_number: String },

    /// The explicit carrier index does not exist in the catalog.
    #[error("no carrier option at index {0}")]
    UnknownCarrier(usize),

    /// A store-level failure with no closer workflow meaning.
    #[error("store error: {0}")]
    Store(StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for WorkflowError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => WorkflowError::NotFound { entity, id },
            StoreError::InsufficientStock {
                sku,
                requested,
                available,
            } => WorkflowError::InsufficientStock {
                sku,
                requested,
                available,
            },
            StoreError::StatusConflict {
                expected, actual, ..
            } => WorkflowError::InvalidState {
                required: expected.to_string(),
                actual,
            },
            other => WorkflowError::Store(other),
        }
    }
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_names_required_and_actual() {
        let error = WorkflowError::InvalidState {
            required: "packed".to_string(),
            actual: OrderStatus::Picked,
        };
        assert_eq!(error.to_string(), "order must be packed (currently picked)");
    }

    #[test]
    fn test_store_errors_map_to_workflow_kinds() {
        let error: WorkflowError = StoreError::InsufficientStock {
            sku: "WH-001".to_string(),
            requested: 6,
            available: 5,
        }
        .into();
        assert!(matches!(error, WorkflowError::InsufficientStock { .. }));

        let error: WorkflowError = StoreError::NotFound {
            entity: "order",
            id: "abc".to_string(),
        }
        .into();
        assert!(matches!(error, WorkflowError::NotFound { .. }));
    }
}
