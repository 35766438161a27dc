//! MiBooks storefront cart library.
//!
//! Client-side cart session management against a remote cart service,
//! with a Magento GraphQL implementation of that service.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod magento;

pub use cart::{CartService, CartSession, CartSnapshot, SessionState};
pub use error::{CartError, Result};
