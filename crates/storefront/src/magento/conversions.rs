//! Conversions from Magento response shapes to cart domain types.
//!
//! Every field the session relies on is checked here. A response that
//! decodes as JSON but breaks an invariant (non-integral quantity, malformed
//! currency code, missing grand total) becomes `MagentoError::Malformed`.

use std::num::NonZeroU32;

use mibooks_core::{CartId, CurrencyCode, LineItemId, Money, Quantity, Sku};
use rust_decimal::Decimal;
use tracing::warn;

use super::MagentoError;
use super::queries::{WireCart, WireCartItem, WireCurrency, WireMergedCart};
use crate::cart::{CartLineItem, CartSnapshot, MergedLineItem, ProductImage, ProductRef};

fn malformed(message: impl Into<String>) -> MagentoError {
    MagentoError::Malformed(message.into())
}

pub fn convert_cart_id(raw: Option<String>) -> Result<CartId, MagentoError> {
    let raw = raw.ok_or_else(|| malformed("missing cart id"))?;
    CartId::parse(&raw).map_err(|e| malformed(format!("cart id: {e}")))
}

pub fn convert_cart(cart: WireCart) -> Result<CartSnapshot, MagentoError> {
    let grand_total = cart
        .prices
        .and_then(|p| p.grand_total)
        .ok_or_else(|| malformed("cart.prices.grand_total is missing"))?;
    let grand_total = convert_money(
        grand_total.value,
        grand_total.currency.as_ref(),
        "grand_total",
    )?;

    let items = cart
        .items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            // Magento nulls out items whose product was disabled
            if item.is_none() {
                warn!("Skipping null cart item");
            }
            item
        })
        .map(convert_line_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CartSnapshot { items, grand_total })
}

fn convert_line_item(item: WireCartItem) -> Result<CartLineItem, MagentoError> {
    let id = convert_line_item_id(&item.id)?;
    let product = item.product;

    let sku = product
        .sku
        .ok_or_else(|| malformed(format!("line {id}: product sku is missing")))?;
    let sku = Sku::parse(&sku).map_err(|e| malformed(format!("line {id}: {e}")))?;

    let image = product.image.and_then(|image| {
        image.url.filter(|url| !url.is_empty()).map(|url| ProductImage {
            url,
            label: image.label,
        })
    });

    let prices = item
        .prices
        .ok_or_else(|| malformed(format!("line {id}: prices are missing")))?;

    Ok(CartLineItem {
        id,
        product: ProductRef {
            name: product.name.unwrap_or_else(|| sku.to_string()),
            sku,
            image,
        },
        quantity: convert_quantity(item.quantity)?,
        unit_price: convert_money(prices.price.value, prices.price.currency.as_ref(), "price")?,
        line_total: convert_money(
            prices.row_total.value,
            prices.row_total.currency.as_ref(),
            "row_total",
        )?,
    })
}

pub fn convert_merged_items(cart: WireMergedCart) -> Result<Vec<MergedLineItem>, MagentoError> {
    cart.items
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(|item| {
            Ok(MergedLineItem {
                id: convert_line_item_id(&item.id)?,
                quantity: convert_quantity(item.quantity)?,
            })
        })
        .collect()
}

// Cart item ids are numeric strings in the 2.4 schema.
fn convert_line_item_id(id: &str) -> Result<LineItemId, MagentoError> {
    id.parse::<i32>()
        .map(LineItemId::new)
        .map_err(|_| malformed(format!("invalid line item id: {id:?}")))
}

// Reported quantities are not held to the client-side request cap.
fn convert_quantity(value: f64) -> Result<Quantity, MagentoError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(malformed(format!("quantity {value} is not a whole number")));
    }
    if value > f64::from(u32::MAX) || value < 1.0 {
        return Err(malformed(format!("quantity {value} is out of range")));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = value as u32;
    NonZeroU32::new(whole)
        .map(Quantity::from_nonzero)
        .ok_or_else(|| malformed(format!("quantity {value} is out of range")))
}

fn convert_money(
    value: Option<f64>,
    currency: Option<&WireCurrency>,
    field: &str,
) -> Result<Money, MagentoError> {
    let value = value
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed(format!("{field}: value is missing")))?;
    // f64 Display is the shortest round-trip form, so 19.99 stays 19.99
    let amount = value
        .to_string()
        .parse::<Decimal>()
        .map_err(|e| malformed(format!("{field}: {e}")))?;

    let currency_code = currency
        .map(currency_str)
        .ok_or_else(|| malformed(format!("{field}: currency is missing")))?
        .parse::<CurrencyCode>()
        .map_err(|e| malformed(format!("{field}: {e}")))?;

    Ok(Money::new(amount, currency_code))
}

fn currency_str(currency: &WireCurrency) -> &str {
    match currency {
        WireCurrency::AUD => "AUD",
        WireCurrency::CAD => "CAD",
        WireCurrency::EUR => "EUR",
        WireCurrency::GBP => "GBP",
        WireCurrency::MXN => "MXN",
        WireCurrency::USD => "USD",
        WireCurrency::Other(code) => code,
    }
}
