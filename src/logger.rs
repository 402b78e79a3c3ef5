//! Logger capability
//!
//! Every component logs through a [`Logger`] handed to it by the engine, so
//! the embedding application decides where messages go. [`TracingLogger`]
//! forwards to `tracing`; [`NoLogger`] (the default) drops everything;
//! [`ChainedLogger`] fans every call out to several loggers in order.
//!
//! Messages are passed as [`fmt::Arguments`], built with `format_args!`, so
//! a discarded message is never formatted.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Four-level logging sink.
pub trait Logger: Send + Sync {
    /// Debug-level message.
    fn debug(&self, tag: &str, message: fmt::Arguments<'_>);

    /// Info-level message.
    fn info(&self, tag: &str, message: fmt::Arguments<'_>);

    /// Warning-level message.
    fn warn(&self, tag: &str, message: fmt::Arguments<'_>);

    /// Error-level message with an optional cause.
    fn error(
        &self,
        tag: &str,
        message: fmt::Arguments<'_>,
        cause: Option<&(dyn StdError + 'static)>,
    );
}

/// Logger that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogger;

impl Logger for NoLogger {
    fn debug(&self, _tag: &str, _message: fmt::Arguments<'_>) {}

    fn info(&self, _tag: &str, _message: fmt::Arguments<'_>) {}

    fn warn(&self, _tag: &str, _message: fmt::Arguments<'_>) {}

    fn error(
        &self,
        _tag: &str,
        _message: fmt::Arguments<'_>,
        _cause: Option<&(dyn StdError + 'static)>,
    ) {
    }
}

/// Logger emitting `tracing` events with the tag as a structured field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, tag: &str, message: fmt::Arguments<'_>) {
        tracing::debug!(tag, "{}", message);
    }

    fn info(&self, tag: &str, message: fmt::Arguments<'_>) {
        tracing::info!(tag, "{}", message);
    }

    fn warn(&self, tag: &str, message: fmt::Arguments<'_>) {
        tracing::warn!(tag, "{}", message);
    }

    fn error(
        &self,
        tag: &str,
        message: fmt::Arguments<'_>,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        match cause {
            Some(cause) => tracing::error!(tag, error = %cause, "{}", message),
            None => tracing::error!(tag, "{}", message),
        }
    }
}

/// Fans every call out to each member, in registration order.
#[derive(Clone)]
pub struct ChainedLogger {
    loggers: Vec<Arc<dyn Logger>>,
}

impl ChainedLogger {
    /// Create a chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `loggers` is empty.
    pub fn new(loggers: Vec<Arc<dyn Logger>>) -> Result<Self> {
        if loggers.is_empty() {
            return Err(Error::Config(
                "a logger chain needs at least one logger".to_string(),
            ));
        }
        Ok(Self { loggers })
    }

    /// Number of chained loggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    /// Always false; an empty chain cannot be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl fmt::Debug for ChainedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedLogger")
            .field("loggers", &self.loggers.len())
            .finish()
    }
}

impl Logger for ChainedLogger {
    fn debug(&self, tag: &str, message: fmt::Arguments<'_>) {
        for logger in &self.loggers {
            logger.debug(tag, message);
        }
    }

    fn info(&self, tag: &str, message: fmt::Arguments<'_>) {
        for logger in &self.loggers {
            logger.info(tag, message);
        }
    }

    fn warn(&self, tag: &str, message: fmt::Arguments<'_>) {
        for logger in &self.loggers {
            logger.warn(tag, message);
        }
    }

    fn error(
        &self,
        tag: &str,
        message: fmt::Arguments<'_>,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        for logger in &self.loggers {
            logger.error(tag, message, cause);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingLogger;
    use super::*;

    #[test]
    fn test_chain_requires_member() {
        assert!(matches!(ChainedLogger::new(vec![]), Err(Error::Config(_))));
    }

    #[test]
    fn test_chain_fans_out_in_order() {
        let first = Arc::new(RecordingLogger::default());
        let second = Arc::new(RecordingLogger::default());
        let members: Vec<Arc<dyn Logger>> = vec![first.clone(), second.clone()];
        let chain = ChainedLogger::new(members).unwrap();

        chain.info("Tag", format_args!("hello {}", 42));
        chain.warn("Tag", format_args!("careful"));

        assert_eq!(first.messages("info"), vec!["hello 42".to_string()]);
        assert_eq!(second.messages("info"), vec!["hello 42".to_string()]);
        assert_eq!(second.messages("warn"), vec!["careful".to_string()]);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_error_carries_cause() {
        let recorder = Arc::new(RecordingLogger::default());
        let members: Vec<Arc<dyn Logger>> = vec![recorder.clone()];
        let chain = ChainedLogger::new(members).unwrap();
        let cause = Error::Storage("disk full".to_string());

        chain.error("Tag", format_args!("persist failed"), Some(&cause));

        assert_eq!(
            recorder.messages("error"),
            vec!["persist failed: Storage error: disk full".to_string()]
        );
    }

    #[test]
    fn test_no_logger_and_tracing_logger_accept_calls() {
        NoLogger.error("Tag", format_args!("ignored"), None);
        TracingLogger.debug("Tag", format_args!("value {}", 1));
        TracingLogger.error("Tag", format_args!("boom"), Some(&Error::Config("x".into())));
    }
}
