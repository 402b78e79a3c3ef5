//! Plain-data engine settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::variant::Lifetime;

/// Default key namespace for persisted state.
pub const DEFAULT_NAMESPACE: &str = "customerschoice";

/// Default upper bound for one configuration fetch.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Serializable part of the engine configuration.
///
/// Lets an embedding application keep these values in its own JSON
/// configuration; collaborators (stores, loggers, reporters) are wired in
/// code through the builder.
///
/// ```rust
/// use customers_choice::config::EngineSettings;
/// use customers_choice::variant::Lifetime;
///
/// let settings: EngineSettings =
///     serde_json::from_str(r#"{"namespace":"shop","lifetime":"persistent"}"#)?;
/// assert_eq!(settings.lifetime, Lifetime::Persistent);
/// assert_eq!(settings.fetch_timeout_ms, 10_000);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Prefix of every persisted key.
    pub namespace: String,
    /// Initial assignment lifetime.
    pub lifetime: Lifetime,
    /// Seed for reproducible selection; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Upper bound for one configuration fetch, in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl EngineSettings {
    /// Fetch timeout as a `Duration`.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            lifetime: Lifetime::Session,
            seed: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}
