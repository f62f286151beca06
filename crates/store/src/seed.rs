//! Demo product catalog.

use common::Money;

use crate::entities::Product;

/// Returns the demo warehouse catalog used by the worker binary and the
/// integration tests.
pub fn demo_products() -> Vec<Product> {
    [
        (
            "WH-001",
            "Wireless Headphones",
            "Noise-cancelling over-ear headphones",
            7999,
            150,
            "A-1-01",
        ),
        (
            "KB-002",
            "Mechanical Keyboard",
            "RGB mechanical keyboard with Cherry MX switches",
            12999,
            85,
            "A-1-02",
        ),
        (
            "MS-003",
            "Ergonomic Mouse",
            "Vertical ergonomic wireless mouse",
            4999,
            200,
            "A-2-01",
        ),
        (
            "MN-004",
            "27\" 4K Monitor",
            "IPS panel, 144Hz refresh rate",
            44999,
            30,
            "B-1-01",
        ),
        (
            "WC-005",
            "HD Webcam",
            "1080p webcam with built-in microphone",
            5999,
            120,
            "A-2-02",
        ),
        (
            "DS-006",
            "Docking Station",
            "USB-C docking station with dual HDMI",
            18999,
            45,
            "B-1-02",
        ),
        (
            "CH-007",
            "USB-C Cable Pack",
            "3-pack braided USB-C cables (3ft, 6ft, 10ft)",
            1999,
            500,
            "C-1-01",
        ),
        (
            "LP-008",
            "Laptop Stand",
            "Adjustable aluminum laptop stand",
            3999,
            90,
            "B-2-01",
        ),
        (
            "MP-009",
            "Desk Mat XL",
            "Extended mouse pad 900x400mm",
            2499,
            175,
            "C-1-02",
        ),
        (
            "PB-010",
            "Power Bank 20000mAh",
            "Fast-charging portable power bank",
            3499,
            250,
            "C-2-01",
        ),
    ]
    .into_iter()
    .map(|(sku, name, description, cents, quantity, location)| {
        Product::new(
            sku,
            name,
            Money::from_cents(cents),
            quantity,
            Some(location.to_string()),
        )
        .with_description(description)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let products = demo_products();
        assert_eq!(products.len(), 10);

        let headphones = products.iter().find(|p| p.sku == "WH-001").unwrap();
        assert_eq!(headphones.quantity, 150);
        assert_eq!(headphones.reserved, 0);
        assert_eq!(headphones.price, Money::from_cents(7999));
        assert_eq!(headphones.location.as_deref(), Some("A-1-01"));
    }

    #[test]
    fn test_skus_are_unique() {
        let products = demo_products();
        let mut skus: Vec<_> = products.iter().map(|p| p.sku.as_str()).collect();
        skus.sort_unstable();
        skus.dedup();
        assert_eq!(skus.len(), products.len());
    }
}
