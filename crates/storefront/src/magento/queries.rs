//! GraphQL operations for the Magento cart API.
//!
//! Types are generated from the documents in `graphql/magento/` against a
//! trimmed copy of the platform schema. They keep the schema's nullability;
//! validation happens in `conversions`.

use graphql_client::GraphQLQuery;

// Cart queries
#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/get_cart.graphql",
    response_derives = "Debug, Clone"
)]
pub struct GetCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/customer_cart.graphql",
    response_derives = "Debug, Clone"
)]
pub struct GetCustomerCart;

// Cart mutations
#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/create_empty_cart.graphql",
    response_derives = "Debug, Clone"
)]
pub struct CreateEmptyCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/add_to_cart.graphql",
    response_derives = "Debug, Clone"
)]
pub struct AddToCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/update_cart_item.graphql",
    response_derives = "Debug, Clone"
)]
pub struct UpdateCartItem;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/remove_from_cart.graphql",
    response_derives = "Debug, Clone"
)]
pub struct RemoveFromCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/magento/schema.graphql",
    query_path = "graphql/magento/merge_carts.graphql",
    response_derives = "Debug, Clone"
)]
pub struct MergeCarts;

/// Cart as selected by `GetCart`.
pub type WireCart = get_cart::GetCartCart;
pub type WireCartItem = get_cart::GetCartCartItems;
pub type WireCurrency = get_cart::CurrencyEnum;
/// Cart returned by `mergeCarts`.
pub type WireMergedCart = merge_carts::MergeCartsMergeCarts;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_uses_document_and_name() {
        let body = GetCart::build_query(get_cart::Variables {
            cart_id: "abc".to_string(),
        });
        assert_eq!(body.operation_name, "GetCart");
        assert!(body.query.contains("query GetCart($cartId: String!)"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["cartId"], "abc");
    }

    #[test]
    fn test_update_variables_are_camel_case() {
        let body = UpdateCartItem::build_query(update_cart_item::Variables {
            cart_id: "abc".to_string(),
            cart_item_id: 42,
            quantity: 3.0,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["cartItemId"], 42);
        assert_eq!(json["variables"]["quantity"], 3.0);
        assert_eq!(json["operationName"], "UpdateCartItem");
    }

    #[test]
    fn test_unlisted_currency_is_kept() {
        let money: get_cart::GetCartCartPricesGrandTotal =
            serde_json::from_value(serde_json::json!({ "value": 499, "currency": "INR" }))
                .unwrap();
        assert!(matches!(money.currency, Some(WireCurrency::Other(ref code)) if code == "INR"));
    }

    #[test]
    fn test_customer_cart_selects_id() {
        let data: get_customer_cart::ResponseData = serde_json::from_value(serde_json::json!({
            "customerCart": { "id": "cust-1" }
        }))
        .unwrap();
        assert_eq!(data.customer_cart.id, "cust-1");
    }

    #[test]
    fn test_mutation_output_requires_cart() {
        let data: remove_from_cart::ResponseData = serde_json::from_value(serde_json::json!({
            "removeItemFromCart": { "cart": { "id": "abc" } }
        }))
        .unwrap();
        assert_eq!(data.remove_item_from_cart.unwrap().cart.id, "abc");

        assert!(
            serde_json::from_value::<remove_from_cart::ResponseData>(serde_json::json!({
                "removeItemFromCart": { "cart": null }
            }))
            .is_err()
        );
    }
}
