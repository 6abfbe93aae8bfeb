//! Command channel into the registry actor.

use tokio::sync::{mpsc, oneshot};

use super::entry::TriggerEntrySnapshot;
use crate::messaging::DatasourceConfig;

/// Commands applied by the registry actor, in arrival order
#[derive(Debug)]
pub enum RegistryCommand {
    /// Create or fully replace the entry for `config.id`.
    ///
    /// Create and update deliberately share one command: an update cancels
    /// whatever was scheduled and reschedules from the new spec, with no
    /// diffing against the old entry.
    Upsert { config: DatasourceConfig },
    /// Disarm and drop the entry if present; unknown ids are a no-op
    Remove { entity_id: i64 },
    /// Reply with a snapshot of all entries
    Snapshot {
        reply: oneshot::Sender<Vec<TriggerEntrySnapshot>>,
    },
    /// Stop the actor loop
    Shutdown,
}

/// Errors surfaced to command senders
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("trigger registry is not running")]
    Closed,
}

/// Cloneable sender half of the registry actor
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    pub(crate) fn new(tx: mpsc::Sender<RegistryCommand>) -> Self {
        Self { tx }
    }

    /// Create or fully replace the trigger for a datasource
    pub async fn upsert(&self, config: DatasourceConfig) -> Result<(), RegistryError> {
        self.tx
            .send(RegistryCommand::Upsert { config })
            .await
            .map_err(|_| RegistryError::Closed)
    }

    /// Remove the trigger for a datasource; unknown ids are a no-op
    pub async fn remove(&self, entity_id: i64) -> Result<(), RegistryError> {
        self.tx
            .send(RegistryCommand::Remove { entity_id })
            .await
            .map_err(|_| RegistryError::Closed)
    }

    /// Snapshot all entries, serialized through the actor like any command
    pub async fn snapshot(&self) -> Result<Vec<TriggerEntrySnapshot>, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Snapshot { reply })
            .await
            .map_err(|_| RegistryError::Closed)?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Request a graceful stop of the actor loop
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        self.tx
            .send(RegistryCommand::Shutdown)
            .await
            .map_err(|_| RegistryError::Closed)
    }
}
