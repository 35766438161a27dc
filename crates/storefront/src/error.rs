//! Errors surfaced by the cart session.
//!
//! Every operation on [`crate::cart::CartSession`] returns `Result<T, CartError>`.
//! The session never retries and never reports on its own; the caller decides
//! whether to notify the user and retry.

use mibooks_core::QuantityError;
use thiserror::Error;

use crate::cart::{ServiceError, StoreError};

/// Error returned by cart session operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Creating the cart failed. No identifier was stored; calling
    /// `ensure_cart` again retries.
    #[error("Cart initialization failed: {0}")]
    Initialization(#[source] ServiceError),

    /// A mutation was attempted before any cart identifier was resolved.
    #[error("No cart available")]
    NoCart,

    /// Adding, updating or removing an item failed. The snapshot is unchanged.
    #[error("Cart mutation failed: {0}")]
    Mutation(#[source] ServiceError),

    /// Merging carts (or looking up the customer cart) failed. The active
    /// identifier is unchanged.
    #[error("Cart merge failed: {0}")]
    Merge(#[source] ServiceError),

    /// Re-fetching the cart failed. The snapshot keeps its previous value.
    #[error("Cart refresh failed: {0}")]
    Refresh(#[source] ServiceError),

    /// The identifier store could not be read or written.
    #[error("Identifier store error: {0}")]
    Storage(#[from] StoreError),

    /// A requested quantity is outside what a line item can hold.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),
}

impl CartError {
    /// The underlying service failure, if this error came from the remote service.
    #[must_use]
    pub const fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Initialization(e) | Self::Mutation(e) | Self::Merge(e) | Self::Refresh(e) => {
                Some(e)
            }
            Self::NoCart | Self::Storage(_) | Self::InvalidQuantity(_) => None,
        }
    }

    /// Whether re-invoking the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NoCart | Self::InvalidQuantity(_) => false,
            Self::Storage(_) => true,
            Self::Initialization(e) | Self::Mutation(e) | Self::Merge(e) | Self::Refresh(e) => {
                matches!(
                    e,
                    ServiceError::Transport(_) | ServiceError::RateLimited(_)
                )
            }
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::NoCart;
        assert_eq!(err.to_string(), "No cart available");

        let err = CartError::Mutation(ServiceError::Rejected(
            "Product that you are trying to add is not available.".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Cart mutation failed: rejected: Product that you are trying to add is not available."
        );
    }

    #[test]
    fn test_retryable() {
        assert!(CartError::Initialization(ServiceError::Transport("timeout".into())).is_retryable());
        assert!(CartError::Mutation(ServiceError::RateLimited(5)).is_retryable());
        assert!(!CartError::Mutation(ServiceError::Rejected("out of stock".into())).is_retryable());
        assert!(!CartError::NoCart.is_retryable());
    }

    #[test]
    fn test_service_error_accessor() {
        let err = CartError::Merge(ServiceError::Unauthorized("no token".into()));
        assert_eq!(
            err.service_error(),
            Some(&ServiceError::Unauthorized("no token".into()))
        );
        assert!(CartError::NoCart.service_error().is_none());
    }
}
