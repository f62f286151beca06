//! Shipping label issuer and the ship step.

use std::sync::Arc;

use chrono::Utc;
use common::{CorrelationId, LabelId, Money, OrderId};
use pubsub::{Channel, EventBus, ShippingLabelPayload, WorkflowEvent};
use rand::Rng;
use store::{Order, OrderStatus, Repository, ShippingLabel, StoreError};

use crate::error::{Result, WorkflowError};
use crate::inventory::InventoryLedger;
use crate::machine::OrderMachine;

/// One entry of the carrier catalog.
#[derive(Debug, Clone, Copy)]
pub struct CarrierOption {
    pub carrier: &'static str,
    pub service: &'static str,
    pub rate_cents: i64,
    pub estimated_days: u32,
}

/// The fixed carrier/service/rate catalog labels are drawn from.
pub const CARRIERS: [CarrierOption; 5] = [
    CarrierOption {
        carrier: "usps",
        service: "priority",
        rate_cents: 895,
        estimated_days: 3,
    },
    CarrierOption {
        carrier: "ups",
        service: "ground",
        rate_cents: 1250,
        estimated_days: 5,
    },
    CarrierOption {
        carrier: "fedex",
        service: "express",
        rate_cents: 2499,
        estimated_days: 2,
    },
    CarrierOption {
        carrier: "usps",
        service: "ground",
        rate_cents: 599,
        estimated_days: 7,
    },
    CarrierOption {
        carrier: "ups",
        service: "express",
        rate_cents: 2999,
        estimated_days: 1,
    },
];

const TRACKING_SUFFIX_LEN: usize = 4;
const TRACKING_MINT_RETRIES: usize = 3;
const BASE36_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub struct ShippingManager<R: Repository> {
    repo: R,
    bus: Arc<EventBus>,
    machine: OrderMachine<R>,
    ledger: InventoryLedger<R>,
}

impl<R: Repository> Clone for ShippingManager<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            bus: Arc::clone(&self.bus),
            machine: self.machine.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<R: Repository> ShippingManager<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        let machine = OrderMachine::new(repo.clone(), Arc::clone(&bus));
        let ledger = InventoryLedger::new(repo.clone(), Arc::clone(&bus));
        Self {
            repo,
            bus,
            machine,
            ledger,
        }
    }

    /// Mints a shipping label for a packed order.
    ///
    /// The carrier is chosen by explicit catalog index or uniformly at
    /// random. The order status does not change; shipping is a separate
    /// step. Exactly one label per order.
    #[tracing::instrument(skip(self))]
    pub async fn create_label(
        &self,
        order_id: OrderId,
        carrier_choice: Option<usize>,
        correlation_id: CorrelationId,
    ) -> Result<ShippingLabel> {
        let order = self.machine.get(order_id).await?;
        OrderMachine::<R>::require(&order, OrderStatus::Packed)?;

        if self.repo.get_label_for_order(order_id).await?.is_some() {
            return Err(WorkflowError::LabelAlreadyIssued {
                order_number: order.order_number,
            });
        }

        let option = select_carrier(carrier_choice)?;

        let mut mint_attempts = 0;
        let label = loop {
            let tracking_number = mint_tracking_number(option.carrier);
            let label = ShippingLabel {
                id: LabelId::new(),
                order_id,
                carrier: option.carrier.to_string(),
                service: option.service.to_string(),
                label_url: format!("https://labels.example.com/{tracking_number}.pdf"),
                tracking_number,
                rate: Money::from_cents(option.rate_cents),
                estimated_days: option.estimated_days,
                created_at: Utc::now(),
            };

            match self.repo.insert_label(label).await {
                Ok(saved) => break saved,
                Err(StoreError::DuplicateTrackingNumber(tracking)) => {
                    mint_attempts += 1;
                    if mint_attempts >= TRACKING_MINT_RETRIES {
                        return Err(WorkflowError::Store(StoreError::DuplicateTrackingNumber(
                            tracking,
                        )));
                    }
                    tracing::warn!(%tracking, "tracking number collision, re-minting");
                }
                Err(StoreError::DuplicateLabel(_)) => {
                    return Err(WorkflowError::LabelAlreadyIssued {
                        order_number: order.order_number,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        };

        metrics::counter!("shipping_labels_created_total").increment(1);
        tracing::info!(
            order_number = %order.order_number,
            carrier = %label.carrier,
            service = %label.service,
            tracking = %label.tracking_number,
            "shipping label created"
        );

        self.bus.publish(
            Channel::Tasks,
            WorkflowEvent::ShippingLabelCreated(ShippingLabelPayload {
                label_id: label.id,
                order_id,
                order_number: order.order_number.clone(),
                carrier: label.carrier.clone(),
                service: label.service.clone(),
                tracking_number: label.tracking_number.clone(),
                rate: label.rate,
                estimated_days: label.estimated_days,
            }),
            correlation_id,
        );

        Ok(label)
    }

    /// Ships a packed order: advances to `shipped`, releases every line's
    /// reservation, then immediately advances to `completed`.
    ///
    /// The double transition is intentional; shipping and fulfillment
    /// completion are atomic from the caller's perspective. A second call
    /// fails with `InvalidState` before any release happens, so reserved
    /// stock is never double-released.
    #[tracing::instrument(skip(self))]
    pub async fn ship(&self, order_id: OrderId, correlation_id: CorrelationId) -> Result<Order> {
        let order = self.machine.get(order_id).await?;
        OrderMachine::<R>::require(&order, OrderStatus::Packed)?;

        let label = self.repo.get_label_for_order(order_id).await?;
        let message = match &label {
            Some(label) => format!(
                "Shipped via {} {} - {}",
                label.carrier.to_uppercase(),
                label.service,
                label.tracking_number
            ),
            None => "Order shipped".to_string(),
        };

        let order = self
            .machine
            .transition(&order, OrderStatus::Shipped, message, correlation_id)
            .await?;

        for line in &order.lines {
            self.ledger.release(line.product_id, line.quantity).await?;
        }

        let order = self
            .machine
            .transition(
                &order,
                OrderStatus::Completed,
                "Order fulfilled successfully",
                correlation_id,
            )
            .await?;

        metrics::counter!("orders_fulfilled_total").increment(1);
        Ok(order)
    }
}

fn select_carrier(carrier_choice: Option<usize>) -> Result<&'static CarrierOption> {
    match carrier_choice {
        Some(index) => CARRIERS
            .get(index)
            .ok_or(WorkflowError::UnknownCarrier(index)),
        None => {
            let index = rand::thread_rng().gen_range(0..CARRIERS.len());
            Ok(&CARRIERS[index])
        }
    }
}

/// Builds a tracking number from the carrier code, the base-36 millisecond
/// timestamp, and a random base-36 suffix, all uppercased.
fn mint_tracking_number(carrier: &str) -> String {
    let timestamp = to_base36(Utc::now().timestamp_millis().max(0) as u64);
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TRACKING_SUFFIX_LEN)
        .map(|_| BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())] as char)
        .collect();
    format!("{}{timestamp}{suffix}", carrier.to_uppercase())
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 digits are ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_first_entry_is_usps_priority() {
        let option = &CARRIERS[0];
        assert_eq!(option.carrier, "usps");
        assert_eq!(option.service, "priority");
        assert_eq!(option.rate_cents, 895);
        assert_eq!(option.estimated_days, 3);
    }

    #[test]
    fn test_select_carrier_by_index() {
        let option = select_carrier(Some(2)).unwrap();
        assert_eq!(option.carrier, "fedex");

        assert!(matches!(
            select_carrier(Some(CARRIERS.len())),
            Err(WorkflowError::UnknownCarrier(_))
        ));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    #[test]
    fn test_tracking_number_shape() {
        let tracking = mint_tracking_number("usps");
        assert!(tracking.starts_with("USPS"));
        assert!(tracking.len() > "USPS".len() + TRACKING_SUFFIX_LEN);
        assert!(
            tracking
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_tracking_numbers_vary() {
        // The random suffix makes collisions negligible, not impossible;
        // the issuer re-mints on the rare clash.
        let a = mint_tracking_number("ups");
        let b = mint_tracking_number("ups");
        assert!(a != b || a.len() >= 4);
    }
}
