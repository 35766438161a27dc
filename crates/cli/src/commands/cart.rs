//! Cart commands.
//!
//! Each command initializes the session first so the cart identifier is
//! resolved (and created on first use) before anything else runs.

use std::fmt::Write as _;

use mibooks_core::{CartId, LineItemId, Quantity, Sku};
use mibooks_storefront::cart::{CartSession, CartSnapshot};
use mibooks_storefront::config::StorefrontConfig;

use super::CommandError;

/// Print the cart.
pub async fn show(session: &CartSession) -> Result<(), CommandError> {
    let snapshot = session.initialize().await?;
    print_cart(session, &snapshot);
    Ok(())
}

/// Add `quantity` units of `sku`.
pub async fn add(session: &CartSession, sku: &str, quantity: i64) -> Result<(), CommandError> {
    let sku = Sku::parse(sku).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    let quantity =
        Quantity::new(quantity).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;

    session.initialize().await?;
    session.add_item(sku.clone(), quantity).await?;

    tracing::info!(sku = %sku, quantity = %quantity, "Added to cart");
    print_cart(session, &session.snapshot());
    Ok(())
}

/// Set a line's quantity, removing it when `quantity` is 0 or less.
pub async fn update(session: &CartSession, line: i32, quantity: i64) -> Result<(), CommandError> {
    session.initialize().await?;
    session
        .set_item_quantity(LineItemId::new(line), quantity)
        .await?;
    print_cart(session, &session.snapshot());
    Ok(())
}

/// Remove a line.
pub async fn remove(session: &CartSession, line: i32) -> Result<(), CommandError> {
    session.initialize().await?;
    session.remove_item(LineItemId::new(line)).await?;
    print_cart(session, &session.snapshot());
    Ok(())
}

/// Merge `source` into `destination` and make `destination` the active cart.
pub async fn merge(
    session: &CartSession,
    source: &str,
    destination: &str,
) -> Result<(), CommandError> {
    let source = parse_cart_id(source)?;
    let destination = parse_cart_id(destination)?;

    session.initialize().await?;
    let active = session.merge_carts(&source, &destination).await?;

    tracing::info!(source = %source, cart_id = %active, "Carts merged");
    print_cart(session, &session.snapshot());
    Ok(())
}

/// Switch to the customer's cart, merging the anonymous cart into it.
pub async fn sign_in(session: &CartSession, config: &StorefrontConfig) -> Result<(), CommandError> {
    if !config.magento.has_customer_token() {
        return Err(CommandError::NotSignedIn);
    }

    let cart_id = session.sign_in().await?;

    tracing::info!(cart_id = %cart_id, "Signed in");
    print_cart(session, &session.snapshot());
    Ok(())
}

fn parse_cart_id(raw: &str) -> Result<CartId, CommandError> {
    CartId::parse(raw).map_err(|e| CommandError::InvalidArgument(e.to_string()))
}

#[allow(clippy::print_stdout)]
fn print_cart(session: &CartSession, snapshot: &CartSnapshot) {
    let cart_id = session
        .cart_id()
        .map_or_else(|| "(none)".to_string(), |id| id.to_string());
    print!("{}", render_cart(&cart_id, snapshot));
}

fn render_cart(cart_id: &str, snapshot: &CartSnapshot) -> String {
    let mut out = format!("Cart {cart_id}\n");

    if snapshot.is_empty() {
        out.push_str("  (empty)\n");
    }

    for item in &snapshot.items {
        let _ = writeln!(
            out,
            "  [{}] {} x{} @ {} = {}  ({})",
            item.id,
            item.product.name,
            item.quantity,
            item.unit_price,
            item.line_total,
            item.product.sku,
        );
    }

    let _ = writeln!(
        out,
        "Total: {} ({} items)",
        snapshot.grand_total,
        snapshot.total_quantity()
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mibooks_core::{CurrencyCode, Money};
    use mibooks_storefront::cart::{CartLineItem, ProductRef};

    #[test]
    fn test_render_empty_cart() {
        let rendered = render_cart("abc", &CartSnapshot::default());
        assert_eq!(rendered, "Cart abc\n  (empty)\nTotal: $0.00 (0 items)\n");
    }

    #[test]
    fn test_render_cart_lines() {
        let snapshot = CartSnapshot {
            items: vec![CartLineItem {
                id: LineItemId::new(12),
                product: ProductRef {
                    sku: Sku::parse("978-0441478125").unwrap(),
                    name: "The Left Hand of Darkness".to_string(),
                    image: None,
                },
                quantity: Quantity::new(2).unwrap(),
                unit_price: Money::from_cents(1999, CurrencyCode::USD),
                line_total: Money::from_cents(3998, CurrencyCode::USD),
            }],
            grand_total: Money::from_cents(3998, CurrencyCode::USD),
        };

        let rendered = render_cart("abc", &snapshot);
        assert!(rendered.contains(
            "  [12] The Left Hand of Darkness x2 @ $19.99 = $39.98  (978-0441478125)\n"
        ));
        assert!(rendered.ends_with("Total: $39.98 (2 items)\n"));
    }

    #[test]
    fn test_parse_cart_id_rejects_blank() {
        assert!(matches!(
            parse_cart_id(""),
            Err(CommandError::InvalidArgument(_))
        ));
    }
}
