//! Persistence of assignments and fetch validators
//!
//! The engine only talks to two capability traits:
//! - [`AssignmentStore`]: chosen buckets for the Persistent lifetime
//! - [`ValidatorStore`]: ETag / Last-Modified pairs per configuration source
//!
//! [`NoPersistence`] (the default) implements both as no-ops.
//! [`KvPersistence`] implements both on top of any [`crate::kv::KvStore`]
//! with this key layout:
//!
//! ```text
//! <namespace>.variants.<experiment>   -> bucket, decimal
//! <namespace>.variants.               -> JSON array of experiment names
//! <namespace>.<source>.etag           -> opaque validator token
//! <namespace>.<source>.lastModified   -> epoch milliseconds, decimal
//! ```

mod kv_backed;

pub use kv_backed::KvPersistence;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Bucket per experiment name. A bucket of `0` means "unassigned".
pub type Assignments = BTreeMap<String, u32>;

/// Durable store for chosen buckets.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Record `entries`.
    ///
    /// Entries with bucket `0` are removed from the store; names absent
    /// from `entries` are left untouched.
    async fn save_assignments(&self, entries: &Assignments) -> Result<()>;

    /// Every stored assignment (buckets are always `>= 1`).
    async fn load_assignments(&self) -> Result<Assignments>;

    /// Remove every stored assignment.
    async fn clear_assignments(&self) -> Result<()>;
}

/// Conditional-request validators of one configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheValidators {
    /// Opaque entity tag (`If-None-Match`).
    pub etag: Option<String>,
    /// Last modification, epoch milliseconds (`If-Modified-Since`).
    pub last_modified: Option<i64>,
}

impl CacheValidators {
    /// Whether neither validator is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Durable store for fetch validators, keyed by source identifier.
#[async_trait]
pub trait ValidatorStore: Send + Sync {
    /// Validators of `source_id`; empty if never stored.
    async fn load_validators(&self, source_id: &str) -> Result<CacheValidators>;

    /// Replace the validators of `source_id`.
    async fn save_validators(&self, source_id: &str, validators: &CacheValidators) -> Result<()>;
}

/// In-memory-only persistence: nothing is written, nothing is restored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

#[async_trait]
impl AssignmentStore for NoPersistence {
    async fn save_assignments(&self, _entries: &Assignments) -> Result<()> {
        Ok(())
    }

    async fn load_assignments(&self) -> Result<Assignments> {
        Ok(Assignments::new())
    }

    async fn clear_assignments(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ValidatorStore for NoPersistence {
    async fn load_validators(&self, _source_id: &str) -> Result<CacheValidators> {
        Ok(CacheValidators::default())
    }

    async fn save_validators(&self, _source_id: &str, _validators: &CacheValidators) -> Result<()> {
        Ok(())
    }
}
