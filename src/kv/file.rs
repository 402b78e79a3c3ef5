//! File-backed KV store: a single JSON object on disk.
//!
//! The whole map is held in memory and rewritten on every mutation through
//! a temporary file plus rename, so a crash leaves either the old or the new
//! state on disk, never a torn file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::KvStore;
use crate::{Error, Result};

/// Durable key-value store persisted as JSON.
///
/// # Example
///
/// ```rust,no_run
/// use customers_choice::kv::{FileKvStore, KvStore};
///
/// # async fn example() -> customers_choice::Result<()> {
/// let store = FileKvStore::open("/var/lib/shop/choices.json").await?;
/// store.set("shop.variants.checkout", "2".to_string()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKvStore {
    /// Open the store at `path`, creating it lazily on first write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read and
    /// [`Error::Storage`] if it does not contain a JSON string map.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Storage(format!("Corrupt store {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn commit(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::Storage(format!("Failed to encode store: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut staged = entries.clone();
        staged.insert(key.to_string(), value);
        self.commit(&staged).await?;
        *entries = staged;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut staged = entries.clone();
        staged.remove(key);
        self.commit(&staged).await?;
        *entries = staged;
        Ok(())
    }

    async fn batch_set(&self, pairs: Vec<(String, String)>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut staged = entries.clone();
        staged.extend(pairs);
        self.commit(&staged).await?;
        *entries = staged;
        Ok(())
    }

    async fn batch_delete(&self, keys: Vec<String>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !keys.iter().any(|key| entries.contains_key(key)) {
            return Ok(());
        }
        let mut staged = entries.clone();
        for key in &keys {
            staged.remove(key);
        }
        self.commit(&staged).await?;
        *entries = staged;
        Ok(())
    }
}
