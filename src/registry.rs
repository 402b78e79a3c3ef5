//! Variant Registry - in-memory map from experiment name to definition
//!
//! The registry itself is single-threaded; the engine serializes access
//! behind one mutex so that assignment and reconfiguration never interleave.

use std::collections::{BTreeMap, HashMap};

use crate::variant::{Variant, UNASSIGNED};

/// In-memory store of variants keyed by name.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    variants: HashMap<String, Variant>,
}

impl VariantRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Insert or replace a variant.
    ///
    /// With `preserve_existing`, a variant already registered under the same
    /// name hands its current bucket to the incoming definition, even when
    /// the weights differ. A bucket the new spreading no longer has is
    /// dropped. Without `preserve_existing` the incoming (normally
    /// unassigned) state wins.
    ///
    /// Returns the replaced definition, if any.
    pub fn insert(&mut self, mut variant: Variant, preserve_existing: bool) -> Option<Variant> {
        if preserve_existing {
            if let Some(existing) = self.variants.get(variant.name()) {
                let bucket = existing.current_variant();
                if bucket <= variant.bucket_count() {
                    variant.set_current_variant(bucket);
                }
            }
        }
        self.variants.insert(variant.name().to_string(), variant)
    }

    /// Get a variant by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name)
    }

    /// Get a mutable variant by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variant> {
        self.variants.get_mut(name)
    }

    /// Return every variant to the unassigned state.
    pub fn reset_all(&mut self) {
        for variant in self.variants.values_mut() {
            variant.set_current_variant(UNASSIGNED);
        }
    }

    /// Names of all registered variants, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variants.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every assigned variant's bucket.
    #[must_use]
    pub fn assignments(&self) -> BTreeMap<String, u32> {
        self.variants
            .values()
            .filter(|v| v.is_assigned())
            .map(|v| (v.name().to_string(), v.current_variant()))
            .collect()
    }
}
