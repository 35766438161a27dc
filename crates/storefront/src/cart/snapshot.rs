//! Cart snapshot types.

use mibooks_core::{CurrencyCode, LineItemId, Money, Quantity, Sku};
use serde::{Deserialize, Serialize};

/// Product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Image URL.
    pub url: String,
    /// Alt text.
    pub label: Option<String>,
}

/// Product a line item refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub sku: Sku,
    pub name: String,
    pub image: Option<ProductImage>,
}

/// One product-quantity entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Server-assigned ID, unique within the cart.
    pub id: LineItemId,
    pub product: ProductRef,
    pub quantity: Quantity,
    pub unit_price: Money,
    /// Unit price times quantity, as computed by the service.
    pub line_total: Money,
}

/// Read-only view of a cart as last reported by the service.
///
/// Snapshots are replaced wholesale; they are never patched locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Line items in server order.
    pub items: Vec<CartLineItem>,
    pub grand_total: Money,
}

impl CartSnapshot {
    /// Snapshot with no items and a zero total.
    #[must_use]
    pub const fn empty(currency_code: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            grand_total: Money::zero(currency_code),
        }
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Find a line item by ID.
    #[must_use]
    pub fn line_item(&self, id: LineItemId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Total quantity across lines carrying `sku`.
    #[must_use]
    pub fn quantity_of(&self, sku: &Sku) -> u64 {
        self.items
            .iter()
            .filter(|item| &item.product.sku == sku)
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self::empty(CurrencyCode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i32, sku: &str, quantity: i64, cents: i64) -> CartLineItem {
        let quantity = Quantity::new(quantity).unwrap();
        CartLineItem {
            id: LineItemId::new(id),
            product: ProductRef {
                sku: Sku::parse(sku).unwrap(),
                name: sku.to_string(),
                image: None,
            },
            quantity,
            unit_price: Money::from_cents(cents, CurrencyCode::USD),
            line_total: Money::from_cents(cents * i64::from(quantity.get()), CurrencyCode::USD),
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CartSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_quantity(), 0);
        assert_eq!(snapshot.grand_total.display(), "$0.00");
    }

    #[test]
    fn test_quantities() {
        let snapshot = CartSnapshot {
            items: vec![
                line(1, "book-fiction-001", 2, 1999),
                line(2, "book-poetry-002", 1, 1250),
                line(3, "book-fiction-001", 1, 1999),
            ],
            grand_total: Money::from_cents(7247, CurrencyCode::USD),
        };

        assert_eq!(snapshot.total_quantity(), 4);
        assert_eq!(
            snapshot.quantity_of(&Sku::parse("book-fiction-001").unwrap()),
            3
        );
        assert_eq!(
            snapshot
                .line_item(LineItemId::new(2))
                .map(|l| l.product.name.as_str()),
            Some("book-poetry-002")
        );
        assert!(snapshot.line_item(LineItemId::new(9)).is_none());
    }
}
