//! Configuration documents
//!
//! ## Document shape
//!
//! ```text
//! {
//!   "resetAll": bool?,                 // unassign every registered variant afterwards
//!   "variants": [
//!     {
//!       "name": string,                // required, entries without it are skipped
//!       "startTime": int64?,           // default 0
//!       "endTime": int64?,             // default i64::MAX
//!       "spreading": [int, ...]?,      // default [1]
//!       "reset": bool?                 // default false: keep the current bucket
//!     }
//!   ]
//! }
//! ```
//!
//! Parsing is split from applying: [`parse_document`] turns text into a
//! [`ConfigUpdate`] without touching any registry, and
//! [`ConfigUpdate::apply`] merges it into a registry in one step. A document
//! that is not valid JSON fails as a whole; a single bad entry is skipped
//! with a warning.

mod settings;

pub use settings::{EngineSettings, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_NAMESPACE};

use serde::Deserialize;

use crate::logger::Logger;
use crate::registry::VariantRegistry;
use crate::variant::Variant;
use crate::{Error, Result};

const TAG: &str = "ConfigParser";

/// Raw configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Unassign every registered variant after applying the entries.
    #[serde(default)]
    pub reset_all: bool,
    /// Variant entries.
    #[serde(default)]
    pub variants: Vec<VariantEntry>,
}

/// One entry of the `variants` array, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantEntry {
    /// Variant name.
    pub name: Option<String>,
    /// Window start, epoch milliseconds.
    pub start_time: Option<i64>,
    /// Window end, epoch milliseconds.
    pub end_time: Option<i64>,
    /// Bucket weights.
    pub spreading: Option<Vec<i64>>,
    /// Drop the current bucket when replacing an existing definition.
    #[serde(default)]
    pub reset: bool,
}

impl VariantEntry {
    /// Validate the entry into a [`Variant`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `name` is missing and
    /// [`Error::InvalidVariant`] when the definition breaks a variant
    /// invariant (including weights outside `1..=u32::MAX`).
    pub fn to_variant(&self) -> Result<Variant> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| Error::Config("variant entry without name".to_string()))?;

        let mut builder = Variant::builder(name);
        if let Some(start) = self.start_time {
            builder = builder.start_time(start);
        }
        if let Some(end) = self.end_time {
            builder = builder.end_time(end);
        }
        if let Some(weights) = &self.spreading {
            let spreading = weights
                .iter()
                .map(|&w| {
                    u32::try_from(w).map_err(|_| {
                        Error::InvalidVariant(format!("variant {name}: weight {w} out of range"))
                    })
                })
                .collect::<Result<Vec<u32>>>()?;
            builder = builder.spreading(spreading);
        }
        builder.build()
    }
}

/// A validated entry with its merge policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    /// The new definition.
    pub variant: Variant,
    /// Keep the bucket of an existing definition with the same name.
    pub preserve_existing: bool,
}

/// Validated result of parsing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Entries in document order.
    pub entries: Vec<ConfigEntry>,
    /// Unassign every variant after applying the entries.
    pub reset_all: bool,
    /// Entries dropped during validation.
    pub skipped: usize,
}

/// Outcome of applying a [`ConfigUpdate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigSummary {
    /// Variants inserted or replaced.
    pub applied: usize,
    /// Entries dropped during validation.
    pub skipped: usize,
    /// Whether every variant was unassigned.
    pub reset_all: bool,
}

impl ConfigUpdate {
    /// Merge into `registry`.
    pub fn apply(self, registry: &mut VariantRegistry) -> ConfigSummary {
        let applied = self.entries.len();
        for entry in self.entries {
            registry.insert(entry.variant, entry.preserve_existing);
        }
        if self.reset_all {
            registry.reset_all();
        }
        ConfigSummary {
            applied,
            skipped: self.skipped,
            reset_all: self.reset_all,
        }
    }
}

/// Validate an already deserialized document.
///
/// Invalid entries are skipped and reported to `logger` at warn level.
pub fn validate_document(document: ConfigDocument, logger: &dyn Logger) -> ConfigUpdate {
    let mut update = ConfigUpdate {
        reset_all: document.reset_all,
        ..ConfigUpdate::default()
    };

    for (index, entry) in document.variants.iter().enumerate() {
        match entry.to_variant() {
            Ok(variant) => {
                logger.debug(TAG, format_args!("parsed {variant}"));
                update.entries.push(ConfigEntry {
                    variant,
                    preserve_existing: !entry.reset,
                });
            }
            Err(e) => {
                logger.warn(TAG, format_args!("skipping variant entry {index}: {e}"));
                update.skipped += 1;
            }
        }
    }

    update
}

/// Parse a JSON configuration document.
///
/// # Errors
///
/// Returns [`Error::Json`] when the text is not a valid document. Entry
/// level problems never fail the parse.
///
/// # Example
///
/// ```rust
/// use customers_choice::config::parse_document;
/// use customers_choice::logger::NoLogger;
///
/// let update = parse_document(
///     r#"{"variants":[{"name":"Z","spreading":[3,3]},{"startTime":5}]}"#,
///     &NoLogger,
/// )?;
/// assert_eq!(update.entries.len(), 1);
/// assert_eq!(update.skipped, 1);
/// # Ok::<(), customers_choice::Error>(())
/// ```
pub fn parse_document(text: &str, logger: &dyn Logger) -> Result<ConfigUpdate> {
    let document: ConfigDocument = serde_json::from_str(text).map_err(|e| {
        logger.error(TAG, format_args!("malformed configuration document"), Some(&e));
        Error::Json(e)
    })?;
    Ok(validate_document(document, logger))
}
