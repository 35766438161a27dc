//! MiBooks Core - Shared cart types.
//!
//! This crate provides the value types used by the storefront cart session
//! and its consumers:
//! - `storefront` - Cart session manager and remote cart service clients
//! - `cli` - Command-line consumer of the cart session
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for cart identifiers, SKUs, quantities and money

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
