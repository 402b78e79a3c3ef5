//! Fluent builder for [`Variant`]

use chrono::{DateTime, Utc};

use super::Variant;
use crate::Result;

/// Builder for `Variant`.
///
/// Defaults: window `(0, i64::MAX)` and a single bucket, so an unconfigured
/// builder yields a variant that is always active and always bucket `1`.
#[derive(Debug, Clone)]
pub struct VariantBuilder {
    name: String,
    start: i64,
    end: i64,
    spreading: Vec<u32>,
}

impl VariantBuilder {
    /// Create a new builder with the required name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: i64::MAX,
            spreading: vec![1],
        }
    }

    /// Replace the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the window start in epoch milliseconds.
    #[must_use]
    pub const fn start_time(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Set the window start from a timestamp.
    #[must_use]
    pub fn start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start = start.timestamp_millis();
        self
    }

    /// Set the window end in epoch milliseconds.
    #[must_use]
    pub const fn end_time(mut self, end: i64) -> Self {
        self.end = end;
        self
    }

    /// Set the window end from a timestamp.
    #[must_use]
    pub fn end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end = end.timestamp_millis();
        self
    }

    /// Set the bucket weights.
    #[must_use]
    pub fn spreading(mut self, spreading: Vec<u32>) -> Self {
        self.spreading = spreading;
        self
    }

    /// Build the `Variant`.
    ///
    /// # Errors
    ///
    /// Same validation as [`Variant::new`].
    pub fn build(self) -> Result<Variant> {
        Variant::new(self.name, self.start, self.end, self.spreading)
    }
}
