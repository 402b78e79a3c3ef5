//! Variant definitions
//!
//! A [`Variant`] names an experiment, the window during which it assigns
//! buckets, and the relative weight of each bucket. Everything except the
//! current assignment is fixed at construction.
//!
//! ## Usage
//!
//! ```rust
//! use customers_choice::variant::Variant;
//!
//! let variant = Variant::builder("checkout-button")
//!     .start_time(0)
//!     .spreading(vec![1, 1])
//!     .build()?;
//!
//! assert_eq!(variant.bucket_count(), 2);
//! assert!(!variant.is_assigned());
//! # Ok::<(), customers_choice::Error>(())
//! ```

mod builder;

pub use builder::VariantBuilder;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Bucket returned for unknown or inactive variants.
pub const DEFAULT_BUCKET: u32 = 1;

/// Marker for "no bucket chosen yet".
pub const UNASSIGNED: u32 = 0;

/// How long a chosen bucket is remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifetime {
    /// Assignments live in memory for the process run only.
    #[default]
    Session,
    /// Assignments are also written to the persistence store.
    Persistent,
}

/// An experiment and its current assignment.
///
/// Serializes for snapshots and logging; construction always goes through
/// [`Variant::new`] or the builder so the invariants hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    name: String,
    start: i64,
    end: i64,
    spreading: Vec<u32>,
    current_variant: u32,
}

impl Variant {
    /// Create an unassigned variant.
    ///
    /// # Arguments
    ///
    /// * `name` - Registry key, must contain a non-whitespace character
    /// * `start` - Window start, epoch milliseconds (exclusive)
    /// * `end` - Window end, epoch milliseconds (exclusive)
    /// * `spreading` - Relative weight of buckets `1..=spreading.len()`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVariant`] for a blank name, an empty spreading
    /// or a zero weight.
    pub fn new(
        name: impl Into<String>,
        start: i64,
        end: i64,
        spreading: Vec<u32>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidVariant(
                "the name must contain at least one non-whitespace character".to_string(),
            ));
        }
        if spreading.is_empty() {
            return Err(Error::InvalidVariant(format!(
                "variant {name}: the spreading must contain at least one weight"
            )));
        }
        if let Some(position) = spreading.iter().position(|&w| w == 0) {
            return Err(Error::InvalidVariant(format!(
                "variant {name}: weight of bucket {} must be positive",
                position + 1
            )));
        }

        Ok(Self {
            name,
            start,
            end,
            spreading,
            current_variant: UNASSIGNED,
        })
    }

    /// Create a builder with the default window (always active) and a
    /// single bucket.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> VariantBuilder {
        VariantBuilder::new(name)
    }

    /// Get the variant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Window start in epoch milliseconds.
    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// Window end in epoch milliseconds.
    #[must_use]
    pub const fn end(&self) -> i64 {
        self.end
    }

    /// Bucket weights, bucket `i + 1` has weight `spreading()[i]`.
    #[must_use]
    pub fn spreading(&self) -> &[u32] {
        &self.spreading
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> u32 {
        u32::try_from(self.spreading.len()).unwrap_or(u32::MAX)
    }

    /// Current bucket, [`UNASSIGNED`] until selection runs.
    #[must_use]
    pub const fn current_variant(&self) -> u32 {
        self.current_variant
    }

    /// Whether a bucket has been chosen.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.current_variant >= 1
    }

    /// Strictly inside the window: `start < now < end`.
    #[must_use]
    pub const fn is_active_at(&self, now: i64) -> bool {
        self.start < now && now < self.end
    }

    pub(crate) fn set_current_variant(&mut self, bucket: u32) {
        self.current_variant = bucket;
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Variant(name:{}; startTime:{}; endTime:{}; spreading:",
            self.name, self.start, self.end
        )?;
        for weight in &self.spreading {
            write!(f, "{weight},")?;
        }
        write!(f, "; current Variant: {})", self.current_variant)
    }
}
