//! Administrative override entry point
//!
//! Scripted test scenarios pin a user into a bucket from outside the
//! process. Commands travel as `name=bucket` text (one per line on a pipe,
//! socket or stdin) or as [`OverrideCommand`] values on a channel, and are
//! applied with [`CustomersChoice::force_variant`].

use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{CustomersChoice, TAG};
use crate::{Error, Result};

/// Force `name` into `bucket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideCommand {
    /// Variant name.
    pub name: String,
    /// Bucket to force, `0` unassigns.
    pub bucket: u32,
}

impl OverrideCommand {
    /// Validate a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a blank name or a negative bucket.
    pub fn new(name: impl Into<String>, bucket: i64) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Config(
                "override command needs a variant name".to_string(),
            ));
        }
        let bucket = u32::try_from(bucket).map_err(|_| {
            Error::Config(format!(
                "override bucket for {name} must be between 0 and {}, got {bucket}",
                u32::MAX
            ))
        })?;
        Ok(Self { name, bucket })
    }
}

impl FromStr for OverrideCommand {
    type Err = Error;

    /// Parse `name=bucket`; the name may itself contain `=`.
    fn from_str(line: &str) -> Result<Self> {
        let (name, bucket) = line
            .trim()
            .rsplit_once('=')
            .ok_or_else(|| Error::Config(format!("expected name=bucket, got {line:?}")))?;
        let bucket = bucket
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("invalid bucket in {line:?}: {e}")))?;
        Self::new(name.trim(), bucket)
    }
}

impl CustomersChoice {
    /// Apply an override command, logging its outcome.
    ///
    /// # Errors
    ///
    /// See [`CustomersChoice::force_variant`].
    pub fn apply_override(&self, command: &OverrideCommand) -> Result<()> {
        self.force_variant(&command.name, command.bucket)
            .map_err(|e| {
                self.logger()
                    .warn(TAG, format_args!("override rejected: {e}"));
                e
            })
    }
}

/// Apply commands from `commands` until the channel closes.
///
/// Resolves to the number of commands applied.
pub fn spawn_listener(
    engine: CustomersChoice,
    mut commands: mpsc::Receiver<OverrideCommand>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut applied = 0;
        while let Some(command) = commands.recv().await {
            if engine.apply_override(&command).is_ok() {
                applied += 1;
            }
        }
        applied
    })
}

/// Apply `name=bucket` lines from `reader` until end of input.
///
/// Blank lines and lines starting with `#` are ignored; malformed lines are
/// logged and skipped.
///
/// # Errors
///
/// Returns [`Error::Io`] if reading fails.
pub async fn serve_lines<R>(engine: &CustomersChoice, reader: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut applied = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<OverrideCommand>() {
            Ok(command) => {
                if engine.apply_override(&command).is_ok() {
                    applied += 1;
                }
            }
            Err(e) => engine
                .logger()
                .warn(TAG, format_args!("override ignored: {e}")),
        }
    }

    Ok(applied)
}
