//! CLI command implementations.

pub mod cart;

use std::sync::Arc;

use mibooks_storefront::cart::{CartSession, FileIdentifierStore};
use mibooks_storefront::config::StorefrontConfig;
use mibooks_storefront::error::CartError;
use mibooks_storefront::magento::{MagentoClient, MagentoError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The Magento client could not be built.
    #[error("Client error: {0}")]
    Client(#[from] MagentoError),

    /// A cart session operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// An argument failed validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The command needs a customer token.
    #[error("MAGENTO_CUSTOMER_TOKEN must be set for this command")]
    NotSignedIn,
}

/// Build a cart session backed by Magento and the on-disk identifier store.
pub fn open_session(config: &StorefrontConfig) -> Result<CartSession, CommandError> {
    let client = MagentoClient::new(&config.magento)?;
    let store = FileIdentifierStore::new(&config.cart_store_path);

    tracing::debug!(
        endpoint = %config.magento.graphql_url,
        store = %config.cart_store_path.display(),
        signed_in = client.is_signed_in(),
        "Opening cart session"
    );

    Ok(CartSession::new(Arc::new(client), Arc::new(store)))
}
