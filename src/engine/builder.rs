//! Builder for [`CustomersChoice`]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::{worker, CustomersChoice, Inner, State};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::kv::KvStore;
use crate::logger::{Logger, NoLogger};
use crate::persistence::{AssignmentStore, KvPersistence, NoPersistence, ValidatorStore};
use crate::registry::VariantRegistry;
use crate::reporter::{NoReporter, Reporter};
use crate::selector::WeightedSelector;
use crate::variant::Lifetime;
use crate::{Error, Result};

type Stores = (Arc<dyn AssignmentStore>, Arc<dyn ValidatorStore>);

/// Deferred so that `kv_store` picks up the final namespace.
type PersistenceFactory = Box<dyn FnOnce(&str) -> Stores + Send>;

fn no_persistence(_namespace: &str) -> Stores {
    (Arc::new(NoPersistence), Arc::new(NoPersistence))
}

/// Builder for `CustomersChoice`.
///
/// Defaults: Session lifetime, no persistence, no logging, no reporting,
/// wall clock, entropy-seeded selection.
pub struct CustomersChoiceBuilder {
    settings: EngineSettings,
    logger: Arc<dyn Logger>,
    reporter: Arc<dyn Reporter>,
    persistence: PersistenceFactory,
    clock: Arc<dyn Clock>,
}

impl Default for CustomersChoiceBuilder {
    fn default() -> Self {
        Self {
            settings: EngineSettings::default(),
            logger: Arc::new(NoLogger),
            reporter: Arc::new(NoReporter),
            persistence: Box::new(no_persistence),
            clock: Arc::new(SystemClock),
        }
    }
}

impl CustomersChoiceBuilder {
    /// Replace every plain-data setting.
    #[must_use]
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Key prefix for persisted state (used by [`Self::kv_store`]).
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.settings.namespace = namespace.into();
        self
    }

    /// Initial lifetime.
    ///
    /// Stored buckets are restored by
    /// [`CustomersChoice::set_lifetime`], after variants are configured.
    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.settings.lifetime = lifetime;
        self
    }

    /// Seed selection for reproducible assignments.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.seed = Some(seed);
        self
    }

    /// Upper bound for one configuration fetch.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.settings.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Logger for engine, parser and worker messages.
    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Receiver of start and goal events.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// One object persisting both assignments and validators.
    #[must_use]
    pub fn persistence<P>(mut self, persistence: Arc<P>) -> Self
    where
        P: AssignmentStore + ValidatorStore + 'static,
    {
        self.persistence = Box::new(move |_namespace: &str| -> Stores {
            let assignments: Arc<dyn AssignmentStore> = persistence.clone();
            let validators: Arc<dyn ValidatorStore> = persistence;
            (assignments, validators)
        });
        self
    }

    /// Persist into a [`KvStore`] under the configured namespace.
    #[must_use]
    pub fn kv_store<S: KvStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.persistence = Box::new(move |namespace: &str| -> Stores {
            let persistence = Arc::new(KvPersistence::new(store, namespace));
            let assignments: Arc<dyn AssignmentStore> = persistence.clone();
            let validators: Arc<dyn ValidatorStore> = persistence;
            (assignments, validators)
        });
        self
    }

    /// Time source for window checks.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the engine and start its persistence worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a tokio runtime.
    pub fn build(self) -> Result<CustomersChoice> {
        let handle = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;

        let (assignments, validators) = (self.persistence)(&self.settings.namespace);
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let worker = handle.spawn(worker::run(
            assignments.clone(),
            self.logger.clone(),
            persist_rx,
        ));

        let selector = self
            .settings
            .seed
            .map_or_else(WeightedSelector::from_entropy, WeightedSelector::seeded);

        Ok(CustomersChoice {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    registry: VariantRegistry::new(),
                    selector,
                    lifetime: self.settings.lifetime,
                }),
                logger: self.logger,
                reporter: self.reporter,
                assignments,
                validators,
                clock: self.clock,
                fetch_timeout: self.settings.fetch_timeout(),
                persist_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }
}
