//! Entity status enums and the order status transition rules.

use serde::{Deserialize, Serialize};

/// The status of an order in its fulfillment life cycle.
///
/// Status transitions:
/// ```text
/// Pending ─► Processing ─► Picking ─► Picked ─► Packing ─► Packed ─► Shipped ─► Completed
///     │          │            │          │          │          │         │
///     └──────────┴────────────┴──────────┴──────────┴──────────┴─────────┴──► Failed
/// ```
///
/// Moves are one-directional. A transition may skip intermediate stages
/// (the manual driver goes straight from `Processing` to `Picked` when the
/// last item is picked); individual operations pin the exact stage they
/// require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Picking,
    Picked,
    Packing,
    Packed,
    Shipped,
    Completed,
    Failed,
}

impl OrderStatus {
    /// Position of the status in the forward sequence.
    fn stage(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Picking => 2,
            OrderStatus::Picked => 3,
            OrderStatus::Packing => 4,
            OrderStatus::Packed => 5,
            OrderStatus::Shipped => 6,
            OrderStatus::Completed => 7,
            OrderStatus::Failed => 8,
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Returns true if the status may move to `next`.
    ///
    /// Only strictly forward moves are legal; `Failed` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == OrderStatus::Failed {
            return true;
        }
        next.stage() > self.stage()
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Picking => "picking",
            OrderStatus::Picked => "picked",
            OrderStatus::Packing => "packing",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a pick list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PickListStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl PickListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickListStatus::Pending => "pending",
            PickListStatus::InProgress => "in_progress",
            PickListStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PickListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a packing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackingStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl PackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackingStatus::Pending => "pending",
            PackingStatus::InProgress => "in_progress",
            PackingStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
