//! Core types for MiBooks.
//!
//! This module provides type-safe wrappers for common cart concepts.

pub mod id;
pub mod price;
pub mod quantity;
pub mod sku;

pub use id::*;
pub use price::{CurrencyCode, CurrencyCodeError, Money};
pub use quantity::{Quantity, QuantityError};
pub use sku::{Sku, SkuError};
