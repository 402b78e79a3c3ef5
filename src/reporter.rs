//! Reporter capability
//!
//! Reporters receive the two lifecycle events of an experiment: a user was
//! put into a bucket, and a user in a bucket reached the goal. Analytics
//! integrations implement [`Reporter`]; [`LogReporter`] writes the events to
//! a [`Logger`].

use std::fmt;
use std::sync::Arc;

use crate::logger::Logger;
use crate::variant::Variant;
use crate::{Error, Result};

/// Receiver of experiment lifecycle events.
pub trait Reporter: Send + Sync {
    /// A variant moved from unassigned to assigned.
    fn on_variant_start(&self, variant: &Variant);

    /// A goal was reached while the variant was active.
    fn on_goal_reached(&self, variant: &Variant);
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReporter;

impl Reporter for NoReporter {
    fn on_variant_start(&self, _variant: &Variant) {}

    fn on_goal_reached(&self, _variant: &Variant) {}
}

/// Reporter writing events to a logger at info level.
#[derive(Clone)]
pub struct LogReporter {
    logger: Arc<dyn Logger>,
}

impl LogReporter {
    const TAG: &'static str = "LogReporter";

    /// Create a reporter writing to `logger`.
    #[must_use]
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl fmt::Debug for LogReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogReporter").finish_non_exhaustive()
    }
}

impl Reporter for LogReporter {
    fn on_variant_start(&self, variant: &Variant) {
        self.logger.info(
            Self::TAG,
            format_args!(
                "start variant ({}) with following case: {}",
                variant.name(),
                variant.current_variant()
            ),
        );
    }

    fn on_goal_reached(&self, variant: &Variant) {
        self.logger.info(
            Self::TAG,
            format_args!(
                "reached goal for variant ({}) with following case: {}",
                variant.name(),
                variant.current_variant()
            ),
        );
    }
}

/// Fans every event out to each member, in registration order.
#[derive(Clone)]
pub struct ChainedReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl ChainedReporter {
    /// Create a chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `reporters` is empty.
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Result<Self> {
        if reporters.is_empty() {
            return Err(Error::Config(
                "a reporter chain needs at least one reporter".to_string(),
            ));
        }
        Ok(Self { reporters })
    }
}

impl fmt::Debug for ChainedReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedReporter")
            .field("reporters", &self.reporters.len())
            .finish()
    }
}

impl Reporter for ChainedReporter {
    fn on_variant_start(&self, variant: &Variant) {
        for reporter in &self.reporters {
            reporter.on_variant_start(variant);
        }
    }

    fn on_goal_reached(&self, variant: &Variant) {
        for reporter in &self.reporters {
            reporter.on_goal_reached(variant);
        }
    }
}
