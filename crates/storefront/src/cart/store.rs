//! Persistent identifier store.
//!
//! Durable key/value storage for the cart identifier, so an anonymous cart
//! survives restarts of the client.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Key under which the active cart identifier is stored.
pub const CART_ID_KEY: &str = "cartId";

/// Errors from an identifier store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("identifier store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("identifier store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key/value storage that outlives the process.
///
/// Writes are idempotent: storing the same value twice is harmless.
#[async_trait]
pub trait IdentifierStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

// =============================================================================
// FileIdentifierStore
// =============================================================================

/// Identifier store backed by a small JSON file.
///
/// The file holds a flat object (`{"cartId": "..."}`). Writes go to a
/// sibling temporary file that is renamed over the original.
#[derive(Debug)]
pub struct FileIdentifierStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileIdentifierStore {
    /// Create a store at `path`. The file and its parent directories are
    /// created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl IdentifierStore for FileIdentifierStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut values = self.read_all().await?;
        Ok(values.remove(key))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut values = self.read_all().await?;
        if values.get(key).map(String::as_str) == Some(value) {
            debug!("Value unchanged, skipping write");
            return Ok(());
        }
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let contents = serde_json::to_vec_pretty(&values).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Identifier store updated");
        Ok(())
    }
}

// =============================================================================
// MemoryIdentifierStore
// =============================================================================

/// In-process identifier store. Values are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryIdentifierStore {
    values: StdMutex<BTreeMap<String, String>>,
}

impl MemoryIdentifierStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a cart identifier.
    #[must_use]
    pub fn with_cart_id(cart_id: &str) -> Self {
        let store = Self::new();
        store.insert(CART_ID_KEY, cart_id);
        store
    }

    fn insert(&self, key: &str, value: &str) {
        let mut values = self
            .values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl IdentifierStore for MemoryIdentifierStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_store_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("mibooks-store-test-{}", std::process::id()))
            .join(name)
            .join("cart.json")
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryIdentifierStore::new();
        assert_eq!(store.get(CART_ID_KEY).await.unwrap(), None);

        store.set(CART_ID_KEY, "abc").await.unwrap();
        assert_eq!(store.get(CART_ID_KEY).await.unwrap().as_deref(), Some("abc"));

        let seeded = MemoryIdentifierStore::with_cart_id("xyz");
        assert_eq!(seeded.get(CART_ID_KEY).await.unwrap().as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let store = FileIdentifierStore::new(temp_store_path("missing"));
        assert_eq!(store.get(CART_ID_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let path = temp_store_path("reopen");
        let _ = tokio::fs::remove_file(&path).await;

        let store = FileIdentifierStore::new(&path);
        store.set(CART_ID_KEY, "cart-1").await.unwrap();
        store.set("other", "value").await.unwrap();
        drop(store);

        let reopened = FileIdentifierStore::new(&path);
        assert_eq!(
            reopened.get(CART_ID_KEY).await.unwrap().as_deref(),
            Some("cart-1")
        );
        assert_eq!(reopened.get("other").await.unwrap().as_deref(), Some("value"));

        reopened.set(CART_ID_KEY, "cart-2").await.unwrap();
        assert_eq!(
            reopened.get(CART_ID_KEY).await.unwrap().as_deref(),
            Some("cart-2")
        );
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let path = temp_store_path("corrupt");
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = FileIdentifierStore::new(&path);
        let err = store.get(CART_ID_KEY).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
