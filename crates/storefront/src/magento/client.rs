//! Magento GraphQL client.

use std::sync::Arc;

use async_trait::async_trait;
use graphql_client::{GraphQLQuery, Response};
use mibooks_core::{CartId, LineItemId, Quantity, Sku};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};
use url::Url;

use super::conversions::{convert_cart, convert_cart_id, convert_merged_items};
use super::queries::{
    AddToCart, CreateEmptyCart, GetCart, GetCustomerCart, MergeCarts, RemoveFromCart,
    UpdateCartItem, add_to_cart, create_empty_cart, get_cart, get_customer_cart, merge_carts,
    remove_from_cart, update_cart_item,
};
use super::{GraphQLError, GraphQLErrorLocation, MagentoError};
use crate::cart::{CartService, CartSnapshot, CustomerCart, MergedLineItem, ServiceError};
use crate::config::MagentoConfig;

/// Client for the Magento GraphQL cart API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct MagentoClient {
    inner: Arc<MagentoClientInner>,
}

struct MagentoClientInner {
    client: reqwest::Client,
    endpoint: Url,
    store_code: Option<String>,
    authorization: Option<SecretString>,
}

impl std::fmt::Debug for MagentoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagentoClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("store_code", &self.inner.store_code)
            .field("signed_in", &self.is_signed_in())
            .finish()
    }
}

impl MagentoClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `MagentoError::Http` if the HTTP client cannot be built.
    pub fn new(config: &MagentoConfig) -> Result<Self, MagentoError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(MagentoClientInner {
                client,
                endpoint: config.graphql_url.clone(),
                store_code: config.store_code.clone(),
                authorization: config.bearer_header().map(SecretString::from),
            }),
        })
    }

    /// Whether requests carry a customer token.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.authorization.is_some()
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, MagentoError> {
        let request_body = Q::build_query(variables);

        let mut request = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&request_body);
        if let Some(store_code) = &self.inner.store_code {
            request = request.header("Store", store_code);
        }
        if let Some(authorization) = &self.inner.authorization {
            request = request.header("Authorization", authorization.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(MagentoError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(_) if !status.is_success() => {
                tracing::error!(
                    status = %status,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Magento API returned non-success status"
                );
                return Err(MagentoError::Status {
                    status: status.as_u16(),
                    body: response_text.chars().take(200).collect(),
                });
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse Magento GraphQL response"
                );
                return Err(MagentoError::Parse(e));
            }
        };

        // Magento reports some resolver failures with a 500 and an errors body
        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(MagentoError::from_graphql_errors(
                errors.into_iter().map(convert_graphql_error).collect(),
            ));
        }

        if !status.is_success() {
            return Err(MagentoError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        response
            .data
            .ok_or_else(|| MagentoError::Malformed("no data in response".to_string()))
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Create an empty guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_empty_cart(&self) -> Result<CartId, MagentoError> {
        let data = self
            .execute::<CreateEmptyCart>(create_empty_cart::Variables)
            .await?;
        convert_cart_id(data.create_empty_cart)
    }

    /// Fetch a cart by ID.
    ///
    /// # Errors
    ///
    /// Returns `MagentoError::NotFound` if the cart does not exist.
    #[instrument(skip_all, fields(cart_id = %cart_id))]
    pub async fn cart(&self, cart_id: &CartId) -> Result<CartSnapshot, MagentoError> {
        let data = self
            .execute::<GetCart>(get_cart::Variables {
                cart_id: cart_id.to_string(),
            })
            .await?;
        let cart = data
            .cart
            .ok_or_else(|| MagentoError::NotFound(format!("cart {cart_id}")))?;
        convert_cart(cart)
    }

    /// Add a simple product to a cart.
    ///
    /// # Errors
    ///
    /// Returns `MagentoError::UserError` if the product cannot be added.
    #[instrument(skip_all, fields(cart_id = %cart_id, sku = %sku, quantity = %quantity))]
    pub async fn add_simple_products_to_cart(
        &self,
        cart_id: &CartId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<(), MagentoError> {
        let data = self
            .execute::<AddToCart>(add_to_cart::Variables {
                cart_id: cart_id.to_string(),
                sku: sku.to_string(),
                quantity: f64::from(quantity.get()),
            })
            .await?;
        expect_cart(data.add_simple_products_to_cart, "addSimpleProductsToCart")
    }

    /// Set the quantity of a cart item.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all, fields(cart_id = %cart_id, line_item_id = %line_item_id, quantity = %quantity))]
    pub async fn update_cart_items(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
        quantity: Quantity,
    ) -> Result<(), MagentoError> {
        let data = self
            .execute::<UpdateCartItem>(update_cart_item::Variables {
                cart_id: cart_id.to_string(),
                cart_item_id: i64::from(line_item_id.as_i32()),
                quantity: f64::from(quantity.get()),
            })
            .await?;
        expect_cart(data.update_cart_items, "updateCartItems")
    }

    /// Remove a cart item.
    ///
    /// # Errors
    ///
    /// Returns `MagentoError::NotFound` if the item is not in the cart.
    #[instrument(skip_all, fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    pub async fn remove_item_from_cart(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
    ) -> Result<(), MagentoError> {
        let data = self
            .execute::<RemoveFromCart>(remove_from_cart::Variables {
                cart_id: cart_id.to_string(),
                cart_item_id: i64::from(line_item_id.as_i32()),
            })
            .await?;
        expect_cart(data.remove_item_from_cart, "removeItemFromCart")
    }

    /// Merge a guest cart into another cart.
    ///
    /// Requires a customer token; the source cart is deactivated by Magento.
    ///
    /// # Errors
    ///
    /// Returns `MagentoError::Unauthorized` without a customer token.
    #[instrument(skip_all, fields(source = %source, destination = %destination))]
    pub async fn merge_carts_into(
        &self,
        source: &CartId,
        destination: &CartId,
    ) -> Result<Vec<MergedLineItem>, MagentoError> {
        let data = self
            .execute::<MergeCarts>(merge_carts::Variables {
                source_cart_id: source.to_string(),
                destination_cart_id: destination.to_string(),
            })
            .await?;
        convert_merged_items(data.merge_carts)
    }

    /// Fetch the signed-in customer's active cart, creating it if needed.
    ///
    /// Resolves the cart id through `customerCart`, then loads its contents
    /// the same way as [`MagentoClient::cart`].
    ///
    /// # Errors
    ///
    /// Returns `MagentoError::Unauthorized` without a customer token.
    #[instrument(skip(self))]
    pub async fn customer_cart(&self) -> Result<CustomerCart, MagentoError> {
        if !self.is_signed_in() {
            return Err(MagentoError::Unauthorized(
                "customer token required".to_string(),
            ));
        }

        let data = self
            .execute::<GetCustomerCart>(get_customer_cart::Variables)
            .await?;
        let id = convert_cart_id(Some(data.customer_cart.id))?;
        let snapshot = self.cart(&id).await?;

        Ok(CustomerCart { id, snapshot })
    }
}

fn expect_cart<T>(output: Option<T>, operation: &str) -> Result<(), MagentoError> {
    output
        .map(|_| ())
        .ok_or_else(|| MagentoError::Malformed(format!("{operation} returned no cart")))
}

fn convert_graphql_error(e: graphql_client::Error) -> GraphQLError {
    GraphQLError {
        message: e.message,
        category: e
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("category"))
            .and_then(|c| c.as_str())
            .map(String::from),
        locations: e.locations.map_or_else(Vec::new, |locs| {
            locs.into_iter()
                .map(|l| GraphQLErrorLocation {
                    line: i64::from(l.line),
                    column: i64::from(l.column),
                })
                .collect()
        }),
        path: e.path.map_or_else(Vec::new, |p| {
            p.into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                    graphql_client::PathFragment::Index(i) => serde_json::Value::Number(i.into()),
                })
                .collect()
        }),
    }
}

#[async_trait]
impl CartService for MagentoClient {
    async fn create_cart(&self) -> Result<CartId, ServiceError> {
        Ok(self.create_empty_cart().await?)
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<CartSnapshot, ServiceError> {
        Ok(self.cart(cart_id).await?)
    }

    async fn add_item(
        &self,
        cart_id: &CartId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<(), ServiceError> {
        Ok(self.add_simple_products_to_cart(cart_id, sku, quantity).await?)
    }

    async fn update_item_quantity(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
        quantity: Quantity,
    ) -> Result<(), ServiceError> {
        Ok(self.update_cart_items(cart_id, line_item_id, quantity).await?)
    }

    async fn remove_item(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
    ) -> Result<(), ServiceError> {
        Ok(self.remove_item_from_cart(cart_id, line_item_id).await?)
    }

    async fn merge_carts(
        &self,
        source: &CartId,
        destination: &CartId,
    ) -> Result<Vec<MergedLineItem>, ServiceError> {
        Ok(self.merge_carts_into(source, destination).await?)
    }

    async fn get_customer_cart(&self) -> Result<CustomerCart, ServiceError> {
        Ok(self.customer_cart().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> MagentoConfig {
        MagentoConfig::for_endpoint("https://shop.example.com/graphql").unwrap()
    }

    #[test]
    fn test_client_debug_hides_token() {
        let client = MagentoClient::new(&config()).unwrap();
        assert!(!client.is_signed_in());

        let signed_in = MagentoClient::new(&MagentoConfig {
            customer_token: Some(SecretString::from("kq8v2mzt7hx4ncw9pld3")),
            ..config()
        })
        .unwrap();
        assert!(signed_in.is_signed_in());

        let debug = format!("{signed_in:?}");
        assert!(debug.contains("shop.example.com"));
        assert!(!debug.contains("kq8v2mzt7hx4ncw9pld3"));
    }

    #[tokio::test]
    async fn test_customer_cart_requires_token() {
        let client = MagentoClient::new(&config()).unwrap();
        let err = client.customer_cart().await.unwrap_err();
        assert!(matches!(err, MagentoError::Unauthorized(_)));
    }

    #[test]
    fn test_convert_graphql_error_reads_category() {
        let raw: graphql_client::Error = serde_json::from_value(serde_json::json!({
            "message": "Could not find a cart with ID \"abc\"",
            "locations": [{ "line": 2, "column": 3 }],
            "path": ["cart"],
            "extensions": { "category": "graphql-no-such-entity" }
        }))
        .unwrap();
        let error = convert_graphql_error(raw);
        assert_eq!(error.category.as_deref(), Some("graphql-no-such-entity"));
        assert_eq!(error.locations[0].line, 2);
        assert_eq!(error.path, vec![serde_json::Value::String("cart".into())]);
    }
}
