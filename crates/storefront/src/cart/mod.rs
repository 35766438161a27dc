//! Client-side cart session.
//!
//! # Architecture
//!
//! - The remote cart service is the source of truth for contents and pricing;
//!   nothing is computed locally
//! - [`CartSession`] owns the cart identifier and the last fetched
//!   [`CartSnapshot`], and re-fetches the whole cart after every mutation
//! - The cart identifier survives restarts through an [`IdentifierStore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use mibooks_storefront::cart::{CartSession, FileIdentifierStore};
//! use mibooks_storefront::magento::MagentoClient;
//!
//! let service = MagentoClient::new(&config.magento)?;
//! let store = FileIdentifierStore::new(&config.cart_store_path);
//! let session = CartSession::new(Arc::new(service), Arc::new(store));
//!
//! session.initialize().await?;
//! session.add_item(Sku::parse("book-fiction-001")?, Quantity::ONE).await?;
//! println!("{}", session.snapshot().grand_total);
//! ```

mod session;
mod snapshot;
mod store;

pub use session::{CartSession, SessionState, SessionView};
pub use snapshot::{CartLineItem, CartSnapshot, ProductImage, ProductRef};
pub use store::{
    CART_ID_KEY, FileIdentifierStore, IdentifierStore, MemoryIdentifierStore, StoreError,
};

use async_trait::async_trait;
use mibooks_core::{CartId, LineItemId, Quantity, Sku};
use thiserror::Error;

/// Transport-agnostic failure reported by a [`CartService`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request never produced a usable response (connect, timeout, HTTP status).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service refused the request (e.g. out of stock, invalid input).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The referenced cart or line item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation needs a signed-in customer.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the service.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Line returned by a cart merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedLineItem {
    /// Line item ID in the destination cart.
    pub id: LineItemId,
    /// Quantity after the merge.
    pub quantity: Quantity,
}

/// The signed-in customer's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerCart {
    /// Identifier of the customer's cart.
    pub id: CartId,
    /// Its current contents.
    pub snapshot: CartSnapshot,
}

/// Remote cart operations.
///
/// Mutations only report success; callers re-fetch the cart with
/// [`CartService::get_cart`] to observe the result.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Create a new, empty anonymous cart.
    async fn create_cart(&self) -> Result<CartId, ServiceError>;

    /// Fetch the full contents of a cart.
    async fn get_cart(&self, cart_id: &CartId) -> Result<CartSnapshot, ServiceError>;

    /// Add `quantity` units of `sku`.
    async fn add_item(
        &self,
        cart_id: &CartId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<(), ServiceError>;

    /// Set the quantity of an existing line.
    async fn update_item_quantity(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
        quantity: Quantity,
    ) -> Result<(), ServiceError>;

    /// Remove a line.
    async fn remove_item(&self, cart_id: &CartId, line_item_id: LineItemId)
    -> Result<(), ServiceError>;

    /// Move the contents of `source` into `destination`.
    async fn merge_carts(
        &self,
        source: &CartId,
        destination: &CartId,
    ) -> Result<Vec<MergedLineItem>, ServiceError>;

    /// Fetch the signed-in customer's cart.
    async fn get_customer_cart(&self) -> Result<CustomerCart, ServiceError>;
}
