//! Key-value storage backends
//!
//! The persistence layer writes assignments and fetch validators as string
//! values under namespaced keys. Two backends ship with the crate:
//! - [`MemoryKvStore`]: `DashMap`, lost on restart
//! - [`FileKvStore`]: one JSON object on disk, rewritten atomically
//!
//! Platform stores (preferences, keychains, databases) implement [`KvStore`]
//! directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use customers_choice::kv::{KvStore, MemoryKvStore};
//!
//! # async fn example() -> customers_choice::Result<()> {
//! let store = MemoryKvStore::new();
//!
//! store.set("shop.variants.checkout", "2".to_string()).await?;
//! let value = store.get("shop.variants.checkout").await?;
//! assert_eq!(value.as_deref(), Some("2"));
//!
//! store.delete("shop.variants.checkout").await?;
//! assert!(!store.exists("shop.variants.checkout").await?);
//! # Ok(())
//! # }
//! ```

mod file;
mod memory;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;

use crate::Result;
use std::future::Future;

/// Async string key-value store.
pub trait KvStore: Send + Sync {
    /// Get a value by key.
    ///
    /// Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Set a value for a key.
    ///
    /// Overwrites any existing value.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;

    /// Delete a key.
    ///
    /// No-op if the key doesn't exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }

    /// Get multiple keys in a batch.
    ///
    /// Returns values in the same order as keys. Missing keys return `None`.
    fn batch_get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Vec<Option<String>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(keys.len());
            for key in keys {
                results.push(self.get(key).await?);
            }
            Ok(results)
        }
    }

    /// Set multiple key-value pairs in a batch.
    ///
    /// Backends that pay per write (like [`FileKvStore`]) override this to
    /// commit once.
    fn batch_set(&self, pairs: Vec<(String, String)>) -> impl Future<Output = Result<()>> + Send {
        async move {
            for (key, value) in pairs {
                self.set(&key, value).await?;
            }
            Ok(())
        }
    }

    /// Delete multiple keys in a batch.
    fn batch_delete(&self, keys: Vec<String>) -> impl Future<Output = Result<()>> + Send {
        async move {
            for key in keys {
                self.delete(&key).await?;
            }
            Ok(())
        }
    }
}
