//! Background persistence worker
//!
//! Assignment paths enqueue commands without blocking; the worker drains
//! the queue, merges consecutive saves into one write, and never touches the
//! registry lock.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::logger::Logger;
use crate::persistence::{AssignmentStore, Assignments};

const TAG: &str = "PersistenceWorker";

/// Work item for the persistence worker.
#[derive(Debug)]
pub(crate) enum PersistCommand {
    /// Write these buckets (0 removes).
    Save(Assignments),
    /// Drop every persisted bucket.
    Clear,
    /// Acknowledge once everything queued before has been written.
    Flush(oneshot::Sender<()>),
    /// Write everything queued before, then stop.
    Shutdown,
}

pub(crate) async fn run(
    store: Arc<dyn AssignmentStore>,
    logger: Arc<dyn Logger>,
    mut commands: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(first) = commands.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = commands.try_recv() {
            batch.push(next);
        }

        let mut pending: Option<Assignments> = None;
        for command in batch {
            match command {
                PersistCommand::Save(entries) => {
                    pending.get_or_insert_with(Assignments::new).extend(entries);
                }
                PersistCommand::Clear => {
                    write(store.as_ref(), logger.as_ref(), pending.take()).await;
                    if let Err(e) = store.clear_assignments().await {
                        logger.error(TAG, format_args!("failed to clear assignments"), Some(&e));
                    }
                }
                PersistCommand::Flush(ack) => {
                    write(store.as_ref(), logger.as_ref(), pending.take()).await;
                    let _ = ack.send(());
                }
                PersistCommand::Shutdown => {
                    write(store.as_ref(), logger.as_ref(), pending.take()).await;
                    logger.debug(TAG, format_args!("stopped"));
                    return;
                }
            }
        }
        write(store.as_ref(), logger.as_ref(), pending).await;
    }
}

async fn write(store: &dyn AssignmentStore, logger: &dyn Logger, entries: Option<Assignments>) {
    let Some(entries) = entries else {
        return;
    };
    match store.save_assignments(&entries).await {
        Ok(()) => logger.debug(TAG, format_args!("saved {} assignment(s)", entries.len())),
        Err(e) => logger.error(
            TAG,
            format_args!("failed to save {} assignment(s)", entries.len()),
            Some(&e),
        ),
    }
}
