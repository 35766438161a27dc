//! Magento GraphQL cart client.
//!
//! # Architecture
//!
//! - `graphql_client` request/response envelopes, HTTP through `reqwest`
//! - Query documents live in `graphql/magento/*.graphql`
//! - The platform is source of truth - no local cart state, direct API calls
//! - Responses are decoded into per-operation structs and validated before
//!   they become domain types; anything malformed is an error
//!
//! # Example
//!
//! ```rust,ignore
//! use mibooks_storefront::magento::MagentoClient;
//!
//! let client = MagentoClient::new(&config.magento)?;
//!
//! let cart_id = client.create_empty_cart().await?;
//! client.add_simple_products_to_cart(&cart_id, &sku, Quantity::ONE).await?;
//! let snapshot = client.cart(&cart_id).await?;
//! ```

mod client;
mod conversions;
pub mod queries;

pub use client::MagentoClient;

use thiserror::Error;

use crate::cart::ServiceError;

/// `extensions.category` for unknown carts, items and products.
const CATEGORY_NO_SUCH_ENTITY: &str = "graphql-no-such-entity";
/// `extensions.category` for invalid input (including out-of-stock adds).
const CATEGORY_INPUT: &str = "graphql-input";
/// `extensions.category` for operations needing a customer token.
const CATEGORY_AUTHORIZATION: &str = "graphql-authorization";

/// Errors that can occur when interacting with the Magento GraphQL API.
#[derive(Debug, Error)]
pub enum MagentoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status without a GraphQL error body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Cart, line item or product not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation requires a customer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the platform.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Input rejected (e.g., product out of stock).
    #[error("User error: {0}")]
    UserError(String),

    /// Response decoded but failed validation.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl MagentoError {
    /// Classify GraphQL errors by the category of the first error.
    fn from_graphql_errors(errors: Vec<GraphQLError>) -> Self {
        let category = errors.first().and_then(|e| e.category.as_deref());
        match category {
            Some(CATEGORY_NO_SUCH_ENTITY) => Self::NotFound(join_messages(&errors)),
            Some(CATEGORY_AUTHORIZATION) => Self::Unauthorized(join_messages(&errors)),
            Some(CATEGORY_INPUT) => Self::UserError(join_messages(&errors)),
            _ => Self::GraphQL(errors),
        }
    }
}

impl From<MagentoError> for ServiceError {
    fn from(err: MagentoError) -> Self {
        match err {
            MagentoError::Http(_) | MagentoError::Status { .. } => Self::Transport(err.to_string()),
            MagentoError::GraphQL(_) => Self::Rejected(err.to_string()),
            MagentoError::UserError(message) => Self::Rejected(message),
            MagentoError::NotFound(message) => Self::NotFound(message),
            MagentoError::Unauthorized(message) => Self::Unauthorized(message),
            MagentoError::RateLimited(seconds) => Self::RateLimited(seconds),
            MagentoError::Parse(_) => Self::Malformed(err.to_string()),
            MagentoError::Malformed(message) => Self::Malformed(message),
        }
    }
}

/// A GraphQL error returned by the Magento API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Magento error category from `extensions.category`.
    pub category: Option<String>,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str, category: Option<&str>) -> GraphQLError {
        GraphQLError {
            message: message.to_string(),
            category: category.map(String::from),
            locations: vec![],
            path: vec![],
        }
    }

    #[test]
    fn test_magento_error_display() {
        let err = MagentoError::NotFound("cart abc".to_string());
        assert_eq!(err.to_string(), "Not found: cart abc");
    }

    #[test]
    fn test_graphql_error_formatting() {
        let err = MagentoError::GraphQL(vec![
            error("Field not found", None),
            error("Invalid ID", None),
        ]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field not found; Invalid ID"
        );
    }

    #[test]
    fn test_graphql_error_path_and_location() {
        let errors = vec![GraphQLError {
            message: String::new(),
            category: None,
            locations: vec![GraphQLErrorLocation { line: 5, column: 10 }],
            path: vec![
                serde_json::Value::String("cart".to_string()),
                serde_json::Value::Number(0.into()),
            ],
        }];
        let err = MagentoError::GraphQL(errors);
        assert_eq!(err.to_string(), "GraphQL errors: path: cart.0 at line 5:10");
    }

    #[test]
    fn test_graphql_error_empty_vec() {
        let err = MagentoError::GraphQL(vec![]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: (no error details provided)"
        );
    }

    #[test]
    fn test_classification_by_category() {
        let err = MagentoError::from_graphql_errors(vec![error(
            "Could not find a cart with ID \"abc\"",
            Some(CATEGORY_NO_SUCH_ENTITY),
        )]);
        assert!(matches!(err, MagentoError::NotFound(ref m) if m.contains("abc")));

        let err = MagentoError::from_graphql_errors(vec![error(
            "The current customer isn't authorized.",
            Some(CATEGORY_AUTHORIZATION),
        )]);
        assert!(matches!(err, MagentoError::Unauthorized(_)));

        let err = MagentoError::from_graphql_errors(vec![error(
            "Product that you are trying to add is not available.",
            Some(CATEGORY_INPUT),
        )]);
        assert!(matches!(err, MagentoError::UserError(_)));

        let err = MagentoError::from_graphql_errors(vec![error("Internal server error", None)]);
        assert!(matches!(err, MagentoError::GraphQL(_)));
    }

    #[test]
    fn test_service_error_mapping() {
        assert_eq!(
            ServiceError::from(MagentoError::UserError("out of stock".into())),
            ServiceError::Rejected("out of stock".into())
        );
        assert_eq!(
            ServiceError::from(MagentoError::NotFound("line 4".into())),
            ServiceError::NotFound("line 4".into())
        );
        assert_eq!(
            ServiceError::from(MagentoError::RateLimited(30)),
            ServiceError::RateLimited(30)
        );
        assert!(matches!(
            ServiceError::from(MagentoError::Status {
                status: 502,
                body: "Bad Gateway".into()
            }),
            ServiceError::Transport(_)
        ));
    }
}
