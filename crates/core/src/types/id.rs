//! Newtype IDs for type-safe cart references.
//!
//! Use the `define_id!` macro to create type-safe integer ID wrappers that
//! prevent accidentally mixing IDs from different entity types. Cart
//! identifiers are opaque server tokens and get their own string newtype.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe integer ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use mibooks_core::define_id;
/// define_id!(OrderLineId);
/// define_id!(ShipmentId);
///
/// let line = OrderLineId::new(1);
/// let shipment = ShipmentId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: OrderLineId = shipment;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Server-assigned line item ID, unique within one cart.
define_id!(LineItemId);

/// Errors that can occur when parsing a [`CartId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartIdError {
    /// The input string is empty or whitespace.
    #[error("cart id cannot be empty")]
    Empty,
    /// The input contains whitespace.
    #[error("cart id cannot contain whitespace")]
    Whitespace,
}

/// Opaque token identifying a cart on the remote cart service.
///
/// The platform hands these out (masked quote IDs for anonymous carts);
/// the client never interprets them. A cart ID is never mutated, only
/// replaced by another one.
///
/// ```
/// use mibooks_core::CartId;
///
/// let id = CartId::parse("Qx3nIoWJ7cH1k9yvAqvO2fT4ZbLr8sEd").unwrap();
/// assert_eq!(id.as_str(), "Qx3nIoWJ7cH1k9yvAqvO2fT4ZbLr8sEd");
///
/// assert!(CartId::parse("").is_err());
/// assert!(CartId::parse("two words").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CartId(String);

impl CartId {
    /// Parse a `CartId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, CartIdError> {
        if s.is_empty() {
            return Err(CartIdError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(CartIdError::Whitespace);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `CartId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CartId {
    type Error = CartIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CartId> for String {
    fn from(id: CartId) -> Self {
        id.0
    }
}

impl AsRef<str> for CartId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_id_roundtrip() {
        let id = LineItemId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_cart_id_rejects_empty() {
        assert_eq!(CartId::parse(""), Err(CartIdError::Empty));
    }

    #[test]
    fn test_cart_id_rejects_whitespace() {
        assert_eq!(CartId::parse(" abc"), Err(CartIdError::Whitespace));
        assert_eq!(CartId::parse("a\tb"), Err(CartIdError::Whitespace));
    }

    #[test]
    fn test_cart_id_serde_is_validated() {
        let id: CartId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");

        assert!(serde_json::from_str::<CartId>("\"\"").is_err());
    }
}
