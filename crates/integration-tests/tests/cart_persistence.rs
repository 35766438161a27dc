//! Integration tests for cart identifier persistence across restarts.

use std::path::PathBuf;
use std::sync::Arc;

use mibooks_integration_tests::{FICTION_SKU, FakeCartService, MergePolicy, qty, sku};
use mibooks_storefront::CartSession;
use mibooks_storefront::cart::{CART_ID_KEY, FileIdentifierStore, IdentifierStore};
use mibooks_storefront::error::CartError;

fn store_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("mibooks-persistence-{}", std::process::id()))
        .join(name)
        .join("cart.json")
}

#[tokio::test]
async fn test_cart_survives_restart() {
    let path = store_path("restart");
    let _ = tokio::fs::remove_file(&path).await;
    let service = Arc::new(FakeCartService::new(MergePolicy::MergeSameSku));

    let first_run = CartSession::new(service.clone(), Arc::new(FileIdentifierStore::new(&path)));
    let cart_id = first_run.ensure_cart().await.expect("ensure_cart failed");
    first_run
        .add_item(sku(FICTION_SKU), qty(2))
        .await
        .expect("add failed");
    drop(first_run);

    let second_run = CartSession::new(service.clone(), Arc::new(FileIdentifierStore::new(&path)));
    let snapshot = second_run.initialize().await.expect("initialize failed");

    assert_eq!(service.create_calls(), 1);
    assert_eq!(second_run.cart_id(), Some(cart_id));
    assert_eq!(snapshot.quantity_of(&sku(FICTION_SKU)), 2);
}

#[tokio::test]
async fn test_merge_persists_destination() {
    let path = store_path("merge");
    let _ = tokio::fs::remove_file(&path).await;
    let service = Arc::new(FakeCartService::new(MergePolicy::MergeSameSku));
    let store = Arc::new(FileIdentifierStore::new(&path));

    let session = CartSession::new(service.clone(), store.clone());
    let anonymous = session.ensure_cart().await.expect("ensure_cart failed");
    let destination = service.seed_cart(&[]);
    session
        .merge_carts(&anonymous, &destination)
        .await
        .expect("merge failed");

    let reopened = FileIdentifierStore::new(&path);
    assert_eq!(
        reopened
            .get(CART_ID_KEY)
            .await
            .expect("store read failed")
            .as_deref(),
        Some(destination.as_str())
    );
}

#[tokio::test]
async fn test_corrupt_store_is_a_storage_error() {
    let path = store_path("corrupt");
    tokio::fs::create_dir_all(path.parent().expect("path has a parent"))
        .await
        .expect("create dir failed");
    tokio::fs::write(&path, b"{ not json")
        .await
        .expect("write failed");

    let service = Arc::new(FakeCartService::new(MergePolicy::MergeSameSku));
    let session = CartSession::new(service.clone(), Arc::new(FileIdentifierStore::new(&path)));

    let err = session.ensure_cart().await.expect_err("corrupt store should fail");
    assert!(matches!(err, CartError::Storage(_)));
    assert_eq!(service.create_calls(), 0);
}

#[tokio::test]
async fn test_merge_refreshes_when_destination_cannot_be_persisted() {
    let path = store_path("merge-unpersisted");
    let _ = tokio::fs::remove_file(&path).await;
    let service = Arc::new(FakeCartService::new(MergePolicy::MergeSameSku));

    let session = CartSession::new(service.clone(), Arc::new(FileIdentifierStore::new(&path)));
    let anonymous = session.ensure_cart().await.expect("ensure_cart failed");
    let destination = service.seed_cart(&[(FICTION_SKU, 3)]);

    tokio::fs::write(&path, b"{ not json")
        .await
        .expect("write failed");

    let err = session
        .merge_carts(&anonymous, &destination)
        .await
        .expect_err("unwritable store should fail");

    assert!(matches!(err, CartError::Storage(_)));
    assert_eq!(session.cart_id(), Some(destination));
    assert_eq!(session.snapshot().quantity_of(&sku(FICTION_SKU)), 3);
}
