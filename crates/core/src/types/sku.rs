//! Product SKU type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Sku`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkuError {
    /// The input string is empty.
    #[error("sku cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("sku must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace.
    #[error("sku cannot contain whitespace")]
    Whitespace,
}

/// A product stock-keeping unit, e.g. `book-fiction-001`.
///
/// ## Constraints
///
/// - Length: 1-64 characters (the platform's SKU column limit)
/// - No whitespace
///
/// ## Examples
///
/// ```
/// use mibooks_core::Sku;
///
/// assert!(Sku::parse("book-fiction-001").is_ok());
///
/// assert!(Sku::parse("").is_err());
/// assert!(Sku::parse("book fiction").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    /// Maximum length of a SKU.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Sku` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 64 characters,
    /// or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, SkuError> {
        if s.is_empty() {
            return Err(SkuError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(SkuError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(char::is_whitespace) {
            return Err(SkuError::Whitespace);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the SKU as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sku() {
        let sku = Sku::parse("book-fiction-001").unwrap();
        assert_eq!(sku.as_str(), "book-fiction-001");
        assert_eq!(sku.to_string(), "book-fiction-001");
    }

    #[test]
    fn test_empty_sku() {
        assert_eq!(Sku::parse(""), Err(SkuError::Empty));
    }

    #[test]
    fn test_sku_too_long() {
        let long = "a".repeat(Sku::MAX_LENGTH + 1);
        assert_eq!(
            Sku::parse(&long),
            Err(SkuError::TooLong {
                max: Sku::MAX_LENGTH
            })
        );
        assert!(Sku::parse(&"a".repeat(Sku::MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_sku_whitespace() {
        assert_eq!(Sku::parse("book 001"), Err(SkuError::Whitespace));
    }
}
