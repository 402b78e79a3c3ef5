//! Assignment Engine
//!
//! [`CustomersChoice`] owns the variant registry and answers "which bucket
//! is this user in?". It is a cheap handle (`Clone` shares the same engine)
//! meant to be constructed once by the embedding application and passed to
//! whoever needs it.
//!
//! ## Guarantees
//!
//! - All registry reads and writes run under one mutex: two callers racing
//!   on the same unassigned variant observe the same bucket.
//! - [`CustomersChoice::get_variant`] never fails and never blocks on I/O;
//!   persistence is queued to a background worker.
//! - Fetches and file reads happen outside the registry lock; only the
//!   final merge takes it.
//!
//! ## Example
//!
//! ```rust
//! use customers_choice::{CustomersChoice, Variant};
//!
//! # #[tokio::main]
//! # async fn main() -> customers_choice::Result<()> {
//! let choice = CustomersChoice::builder().seed(7).build()?;
//! choice.configure_from_str(r#"{"variants":[{"name":"checkout","spreading":[1,1]}]}"#)?;
//!
//! let bucket = choice.get_variant("checkout");
//! assert!(bucket == 1 || bucket == 2);
//! assert_eq!(choice.get_variant("checkout"), bucket);
//!
//! // unknown experiments are always bucket 1
//! assert_eq!(choice.get_variant("nope"), 1);
//! choice.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod builder;
mod worker;

pub use builder::CustomersChoiceBuilder;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::{parse_document, ConfigSummary, ConfigUpdate};
use crate::fetch::{ConfigSource, FetchRequest, FetchResponse};
use crate::logger::Logger;
use crate::persistence::{AssignmentStore, Assignments, ValidatorStore};
use crate::registry::VariantRegistry;
use crate::reporter::Reporter;
use crate::selector::WeightedSelector;
use crate::variant::{Lifetime, Variant, DEFAULT_BUCKET, UNASSIGNED};
use crate::{Error, Result};

use worker::PersistCommand;

/// Log tag of the engine.
pub const TAG: &str = "CustomersChoice";

/// Result of [`CustomersChoice::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New content was parsed and merged.
    Updated(ConfigSummary),
    /// The source reported no change.
    NotModified,
}

struct State {
    registry: VariantRegistry,
    selector: WeightedSelector,
    lifetime: Lifetime,
}

struct Inner {
    state: Mutex<State>,
    logger: Arc<dyn Logger>,
    reporter: Arc<dyn Reporter>,
    assignments: Arc<dyn AssignmentStore>,
    validators: Arc<dyn ValidatorStore>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    persist_tx: mpsc::UnboundedSender<PersistCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Variant assignment engine.
#[derive(Clone)]
pub struct CustomersChoice {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CustomersChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("CustomersChoice")
            .field("variants", &state.registry.len())
            .field("lifetime", &state.lifetime)
            .finish_non_exhaustive()
    }
}

impl CustomersChoice {
    /// Create a builder with in-memory defaults.
    #[must_use]
    pub fn builder() -> CustomersChoiceBuilder {
        CustomersChoiceBuilder::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panicking reporter must not take assignment down with it
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn logger(&self) -> &dyn Logger {
        self.inner.logger.as_ref()
    }

    /// Queue `command` for the worker. Callers hold the state guard so the
    /// queue order matches the order mutations were applied in.
    fn submit(&self, command: PersistCommand) -> bool {
        self.inner.persist_tx.send(command).is_ok()
    }

    fn submit_delta(&self, before: &Assignments, after: &Assignments) -> bool {
        let delta = assignment_delta(before, after);
        delta.is_empty() || self.submit(PersistCommand::Save(delta))
    }

    fn warn_dropped(&self, queued: bool) {
        if !queued {
            self.logger().warn(
                TAG,
                format_args!("persistence worker stopped, write dropped"),
            );
        }
    }

    /// Bucket of `name` for this user.
    ///
    /// Returns [`DEFAULT_BUCKET`] for unknown variants and outside the
    /// variant's window (`start < now < end`, strict on both sides). The
    /// first call inside the window draws a bucket, which then sticks for
    /// the rest of the lifetime; that transition is reported to the
    /// reporter exactly once.
    pub fn get_variant(&self, name: &str) -> u32 {
        let now = self.inner.clock.now_millis();

        let (started, queued) = {
            let mut state = self.state();
            let State {
                registry,
                selector,
                lifetime,
            } = &mut *state;

            let Some(variant) = registry.get_mut(name) else {
                return DEFAULT_BUCKET;
            };
            if !variant.is_active_at(now) {
                return DEFAULT_BUCKET;
            }
            if variant.is_assigned() {
                return variant.current_variant();
            }

            match selector.select(variant.spreading()) {
                Ok(bucket) => variant.set_current_variant(bucket),
                Err(e) => {
                    self.logger().error(
                        TAG,
                        format_args!("selection for {name} failed, using default bucket"),
                        Some(&e),
                    );
                    return DEFAULT_BUCKET;
                }
            }

            let queued = *lifetime != Lifetime::Persistent || {
                let mut entries = Assignments::new();
                entries.insert(variant.name().to_string(), variant.current_variant());
                self.submit(PersistCommand::Save(entries))
            };
            (variant.clone(), queued)
        };

        self.warn_dropped(queued);
        self.logger().debug(TAG, format_args!("assigned {started}"));
        self.inner.reporter.on_variant_start(&started);
        started.current_variant()
    }

    /// Report that the user reached the goal of `name`.
    ///
    /// Reported only while the variant's window is active and a bucket has
    /// been assigned. Returns whether the event was reported.
    pub fn reaches_goal(&self, name: &str) -> bool {
        let now = self.inner.clock.now_millis();
        let reached = {
            let state = self.state();
            state
                .registry
                .get(name)
                .filter(|v| v.is_active_at(now) && v.is_assigned())
                .cloned()
        };

        match reached {
            Some(variant) => {
                self.inner.reporter.on_goal_reached(&variant);
                true
            }
            None => {
                self.logger().debug(
                    TAG,
                    format_args!("goal for {name} ignored: unknown, inactive or unassigned"),
                );
                false
            }
        }
    }

    /// Set the bucket of `name` regardless of window and prior assignment.
    ///
    /// Bucket `0` returns the variant to the unassigned state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariant`] if `name` is not registered and
    /// [`Error::InvalidBucket`] if `bucket` exceeds the variant's bucket
    /// count.
    pub fn force_variant(&self, name: &str, bucket: u32) -> Result<()> {
        let queued = {
            let mut state = self.state();
            let persistent = state.lifetime == Lifetime::Persistent;
            let variant = state
                .registry
                .get_mut(name)
                .ok_or_else(|| Error::UnknownVariant(name.to_string()))?;

            let max = variant.bucket_count();
            if bucket > max {
                return Err(Error::InvalidBucket {
                    name: name.to_string(),
                    bucket,
                    max,
                });
            }
            variant.set_current_variant(bucket);

            !persistent || {
                let mut entries = Assignments::new();
                entries.insert(name.to_string(), bucket);
                self.submit(PersistCommand::Save(entries))
            }
        };

        self.warn_dropped(queued);
        self.logger()
            .info(TAG, format_args!("forced {name} to bucket {bucket}"));
        Ok(())
    }

    /// Insert or replace a variant.
    ///
    /// With `preserve_existing`, an already registered variant of the same
    /// name keeps its bucket; otherwise the new definition starts
    /// unassigned.
    pub fn add_variant(&self, variant: Variant, preserve_existing: bool) {
        let name = variant.name().to_string();
        let queued = {
            let mut state = self.state();
            let before = state.registry.assignments();
            state.registry.insert(variant, preserve_existing);
            state.lifetime != Lifetime::Persistent
                || self.submit_delta(&before, &state.registry.assignments())
        };

        self.warn_dropped(queued);
        self.logger().debug(TAG, format_args!("added variant {name}"));
    }

    /// Merge a parsed configuration update.
    pub fn apply_update(&self, update: ConfigUpdate) -> ConfigSummary {
        let (summary, queued) = {
            let mut state = self.state();
            let before = state.registry.assignments();
            let summary = update.apply(&mut state.registry);
            let queued = state.lifetime != Lifetime::Persistent
                || self.submit_delta(&before, &state.registry.assignments());
            (summary, queued)
        };

        self.warn_dropped(queued);
        self.logger().info(
            TAG,
            format_args!(
                "configuration applied: {} variant(s), {} skipped, reset all: {}",
                summary.applied, summary.skipped, summary.reset_all
            ),
        );
        summary
    }

    /// Parse and merge a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for a malformed document; the registry is
    /// left unchanged in that case.
    pub fn configure_from_str(&self, document: &str) -> Result<ConfigSummary> {
        let update = parse_document(document, self.logger())?;
        Ok(self.apply_update(update))
    }

    /// Read, parse and merge a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Json`]
    /// if it is malformed. Either way the registry is left unchanged.
    pub async fn configure_from_file(&self, path: impl AsRef<Path>) -> Result<ConfigSummary> {
        let path = path.as_ref();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                self.logger().error(
                    TAG,
                    format_args!("cannot read configuration {}", path.display()),
                    Some(&e),
                );
                return Err(Error::Io(e));
            }
        };
        self.configure_from_str(&text)
    }

    /// Conditionally fetch `source` and merge new content.
    ///
    /// Stored validators are sent along; on new content the document is
    /// merged and the new validators stored. A late fetch still applies
    /// after [`CustomersChoice::reset_all`] (last write wins).
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] when the source exceeds the fetch timeout
    /// - [`Error::Fetch`] for an unusable status
    /// - whatever the source or parser reports
    ///
    /// The registry is unchanged on every error.
    pub async fn refresh(&self, source: &dyn ConfigSource) -> Result<RefreshOutcome> {
        let source_id = source.source_id().to_string();

        let validators = match self.inner.validators.load_validators(&source_id).await {
            Ok(validators) => validators,
            Err(e) => {
                self.logger().warn(
                    TAG,
                    format_args!("validators for {source_id} unavailable, fetching unconditionally: {e}"),
                );
                Default::default()
            }
        };
        let request = FetchRequest::new(source_id.clone(), validators);

        let response = tokio::time::timeout(self.inner.fetch_timeout, source.fetch(&request))
            .await
            .map_err(|_| Error::Timeout(source_id.clone()))
            .and_then(|fetched| fetched)
            .map_err(|e| {
                self.logger()
                    .error(TAG, format_args!("fetch of {source_id} failed"), Some(&e));
                e
            })?;

        match response {
            FetchResponse::Modified { body, validators } => {
                let summary = self.configure_from_str(&body)?;
                if let Err(e) = self
                    .inner
                    .validators
                    .save_validators(&source_id, &validators)
                    .await
                {
                    self.logger().error(
                        TAG,
                        format_args!("failed to store validators for {source_id}"),
                        Some(&e),
                    );
                }
                Ok(RefreshOutcome::Updated(summary))
            }
            FetchResponse::NotModified => {
                self.logger()
                    .debug(TAG, format_args!("{source_id} not modified"));
                Ok(RefreshOutcome::NotModified)
            }
            FetchResponse::Failed { status } => {
                let e = Error::Fetch { source_id, status };
                self.logger().error(TAG, format_args!("refresh rejected"), Some(&e));
                Err(e)
            }
        }
    }

    /// Run [`CustomersChoice::refresh`] as a background task.
    pub fn spawn_refresh(
        &self,
        source: Arc<dyn ConfigSource>,
    ) -> JoinHandle<Result<RefreshOutcome>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.refresh(source.as_ref()).await })
    }

    /// Unassign every registered variant.
    pub fn reset_all(&self) {
        let queued = {
            let mut state = self.state();
            let before = state.registry.assignments();
            state.registry.reset_all();
            state.lifetime != Lifetime::Persistent
                || self.submit_delta(&before, &Assignments::new())
        };

        self.warn_dropped(queued);
        self.logger().info(TAG, format_args!("all variants reset"));
    }

    /// Current assignment lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.state().lifetime
    }

    /// Switch the assignment lifetime.
    ///
    /// Switching to [`Lifetime::Persistent`] restores stored buckets into
    /// matching registered variants that are still unassigned and then
    /// persists every current assignment. Switching to [`Lifetime::Session`]
    /// clears the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error if stored buckets cannot be loaded; the
    /// lifetime is switched regardless.
    pub async fn set_lifetime(&self, lifetime: Lifetime) -> Result<()> {
        match lifetime {
            Lifetime::Session => {
                let queued = {
                    let mut state = self.state();
                    state.lifetime = lifetime;
                    self.submit(PersistCommand::Clear)
                };
                self.warn_dropped(queued);
                Ok(())
            }
            Lifetime::Persistent => {
                self.state().lifetime = lifetime;
                // let a queued clear land before reading
                self.flush().await;
                let restored = self.inner.assignments.load_assignments().await.map_err(|e| {
                    self.logger()
                        .error(TAG, format_args!("cannot restore assignments"), Some(&e));
                    e
                })?;

                let (ignored, queued) = {
                    let mut state = self.state();
                    let ignored: Vec<Error> = restored
                        .iter()
                        .filter_map(|(name, bucket)| {
                            restore_variant(&mut state.registry, name, *bucket).err()
                        })
                        .collect();
                    let current = state.registry.assignments();
                    let queued = current.is_empty() || self.submit(PersistCommand::Save(current));
                    (ignored, queued)
                };

                self.warn_dropped(queued);
                for e in ignored {
                    self.logger()
                        .warn(TAG, format_args!("stored bucket ignored: {e}"));
                }
                Ok(())
            }
        }
    }

    /// Snapshot of a registered variant.
    #[must_use]
    pub fn variant(&self, name: &str) -> Option<Variant> {
        self.state().registry.get(name).cloned()
    }

    /// Names of all registered variants, sorted.
    #[must_use]
    pub fn variant_names(&self) -> Vec<String> {
        self.state().registry.names()
    }

    /// Wait until every queued persistence write has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.inner.persist_tx.send(PersistCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Write everything queued and stop the persistence worker.
    ///
    /// Later persistence triggers are dropped with a warning; assignment
    /// keeps working in memory.
    pub async fn shutdown(&self) {
        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        let _ = self.inner.persist_tx.send(PersistCommand::Shutdown);
        if let Err(e) = handle.await {
            self.logger()
                .error(TAG, format_args!("persistence worker panicked"), Some(&e));
        }
    }
}

/// Hydrate `name` with a stored bucket unless it already holds one.
///
/// Buckets drawn or forced while the store was being read are newer than
/// the stored ones and win.
fn restore_variant(registry: &mut VariantRegistry, name: &str, bucket: u32) -> Result<()> {
    let variant = registry
        .get_mut(name)
        .ok_or_else(|| Error::UnknownVariant(name.to_string()))?;
    if variant.is_assigned() {
        return Ok(());
    }
    let max = variant.bucket_count();
    if bucket > max {
        return Err(Error::InvalidBucket {
            name: name.to_string(),
            bucket,
            max,
        });
    }
    variant.set_current_variant(bucket);
    Ok(())
}

/// Buckets that differ between two snapshots; vanished entries map to
/// [`UNASSIGNED`].
fn assignment_delta(before: &Assignments, after: &Assignments) -> Assignments {
    let mut delta: Assignments = after
        .iter()
        .filter(|(name, bucket)| before.get(*name) != Some(bucket))
        .map(|(name, bucket)| (name.clone(), *bucket))
        .collect();
    for name in before.keys() {
        if !after.contains_key(name) {
            delta.insert(name.clone(), UNASSIGNED);
        }
    }
    delta
}
