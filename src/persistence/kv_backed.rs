//! Persistence on top of a [`KvStore`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{AssignmentStore, Assignments, CacheValidators, ValidatorStore};
use crate::config::DEFAULT_NAMESPACE;
use crate::kv::KvStore;
use crate::{Error, Result};

/// Assignment and validator persistence over any [`KvStore`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use customers_choice::kv::MemoryKvStore;
/// use customers_choice::persistence::{AssignmentStore, KvPersistence};
///
/// # async fn example() -> customers_choice::Result<()> {
/// let kv = Arc::new(MemoryKvStore::new());
/// let persistence = KvPersistence::new(kv.clone(), "shop");
///
/// let mut entries = std::collections::BTreeMap::new();
/// entries.insert("checkout".to_string(), 2);
/// persistence.save_assignments(&entries).await?;
///
/// assert_eq!(persistence.load_assignments().await?, entries);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct KvPersistence<S> {
    store: Arc<S>,
    namespace: String,
}

impl<S: KvStore> KvPersistence<S> {
    /// Persist into `store` under `namespace`.
    #[must_use]
    pub fn new(store: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Persist into `store` under the default namespace.
    #[must_use]
    pub fn with_default_namespace(store: Arc<S>) -> Self {
        Self::new(store, DEFAULT_NAMESPACE)
    }

    /// Key prefix of every entry.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key holding the set of persisted experiment names.
    #[must_use]
    pub fn names_key(&self) -> String {
        format!("{}.variants.", self.namespace)
    }

    /// Key holding the bucket of `name`.
    #[must_use]
    pub fn variant_key(&self, name: &str) -> String {
        format!("{}.variants.{name}", self.namespace)
    }

    /// Key holding the ETag of `source_id`.
    #[must_use]
    pub fn etag_key(&self, source_id: &str) -> String {
        format!("{}.{source_id}.etag", self.namespace)
    }

    /// Key holding the Last-Modified timestamp of `source_id`.
    #[must_use]
    pub fn last_modified_key(&self, source_id: &str) -> String {
        format!("{}.{source_id}.lastModified", self.namespace)
    }

    async fn known_names(&self) -> Result<BTreeSet<String>> {
        match self.store.get(&self.names_key()).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Storage(format!("Corrupt name set at {}: {e}", self.names_key()))
            }),
            None => Ok(BTreeSet::new()),
        }
    }

    fn encode_names(names: &BTreeSet<String>) -> Result<String> {
        serde_json::to_string(names)
            .map_err(|e| Error::Storage(format!("Failed to encode name set: {e}")))
    }
}

#[async_trait]
impl<S: KvStore + 'static> AssignmentStore for KvPersistence<S> {
    async fn save_assignments(&self, entries: &Assignments) -> Result<()> {
        let mut names = self.known_names().await?;
        let mut writes = Vec::new();
        let mut removals = Vec::new();

        for (name, &bucket) in entries {
            if bucket == 0 {
                if names.remove(name) {
                    removals.push(self.variant_key(name));
                }
            } else {
                names.insert(name.clone());
                writes.push((self.variant_key(name), bucket.to_string()));
            }
        }

        writes.push((self.names_key(), Self::encode_names(&names)?));
        self.store.batch_set(writes).await?;
        if !removals.is_empty() {
            self.store.batch_delete(removals).await?;
        }
        Ok(())
    }

    async fn load_assignments(&self) -> Result<Assignments> {
        let names = self.known_names().await?;
        let mut assignments = Assignments::new();

        for name in names {
            // unparsable or zero buckets are dropped rather than failing the restore
            if let Some(raw) = self.store.get(&self.variant_key(&name)).await? {
                if let Ok(bucket) = raw.trim().parse::<u32>() {
                    if bucket > 0 {
                        assignments.insert(name, bucket);
                    }
                }
            }
        }

        Ok(assignments)
    }

    async fn clear_assignments(&self) -> Result<()> {
        let names = self.known_names().await?;
        let mut keys: Vec<String> = names.iter().map(|name| self.variant_key(name)).collect();
        keys.push(self.names_key());
        self.store.batch_delete(keys).await
    }
}

#[async_trait]
impl<S: KvStore + 'static> ValidatorStore for KvPersistence<S> {
    async fn load_validators(&self, source_id: &str) -> Result<CacheValidators> {
        let etag = self.store.get(&self.etag_key(source_id)).await?;
        let last_modified = self
            .store
            .get(&self.last_modified_key(source_id))
            .await?
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        Ok(CacheValidators {
            etag,
            last_modified,
        })
    }

    async fn save_validators(&self, source_id: &str, validators: &CacheValidators) -> Result<()> {
        let etag_key = self.etag_key(source_id);
        let last_modified_key = self.last_modified_key(source_id);

        let mut writes = Vec::new();
        let mut removals = Vec::new();
        match &validators.etag {
            Some(etag) => writes.push((etag_key, etag.clone())),
            None => removals.push(etag_key),
        }
        match validators.last_modified {
            Some(millis) => writes.push((last_modified_key, millis.to_string())),
            None => removals.push(last_modified_key),
        }

        if !writes.is_empty() {
            self.store.batch_set(writes).await?;
        }
        if !removals.is_empty() {
            self.store.batch_delete(removals).await?;
        }
        Ok(())
    }
}
