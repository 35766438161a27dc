//! Positive line item quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative quantity.
    #[error("quantity must be at least 1, got {0}")]
    NotPositive(i64),
    /// Larger than the platform accepts.
    #[error("quantity must be at most {max}, got {got}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
        /// Requested quantity.
        got: i64,
    },
}

/// A line item quantity, always at least 1.
///
/// A request for zero items is not a quantity; callers that accept raw
/// numbers (e.g. a "-" button) should route values below 1 to a removal.
///
/// ```
/// use mibooks_core::Quantity;
///
/// assert_eq!(Quantity::new(3).unwrap().get(), 3);
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Largest quantity a caller may request for a single line.
    ///
    /// Quantities the platform reports back are not held to this cap; see
    /// [`Quantity::from_nonzero`].
    pub const MAX: u32 = 10_000;

    /// A single item.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity from a raw count.
    ///
    /// # Errors
    ///
    /// Returns an error if the count is below 1 or above [`Quantity::MAX`].
    pub fn new(count: i64) -> Result<Self, QuantityError> {
        if count < 1 {
            return Err(QuantityError::NotPositive(count));
        }
        let value = u32::try_from(count)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .and_then(NonZeroU32::new)
            .ok_or(QuantityError::TooLarge {
                max: Self::MAX,
                got: count,
            })?;
        Ok(Self(value))
    }

    /// Wrap a count that is already known to be positive.
    ///
    /// Skips the [`Quantity::MAX`] request cap, for counts the platform
    /// reports (its per-product `max_sale_qty` may be set higher).
    #[must_use]
    pub const fn from_nonzero(count: NonZeroU32) -> Self {
        Self(count)
    }

    /// The count as an integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}
