//! # System Composition
//!
//! Wires the scheduler core together for a deployment: replay the startup
//! snapshot, connect the bus with bounded retries, start the registry actor
//! and the ingress consumer, and hand back a lifecycle handle.
//!
//! Both startup steps are fail-fast: a scheduler without its snapshot or
//! without an event feed must not come up half-alive.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bootstrap::{self, SnapshotSource};
use crate::config::SchedulerConfig;
use crate::correlator::ExecutionCorrelator;
use crate::dispatch::{Dispatcher, TriggerPort};
use crate::error::Result;
use crate::execution::{ImportRunner, PipelineResolver};
use crate::logging;
use crate::messaging::{connect_with_retry, BusConnector, IngressConsumer};
use crate::registry::{RegistryHandle, TriggerEntrySnapshot, TriggerRegistry};

/// Running scheduler core with lifecycle management
pub struct SchedulerSystem {
    registry: RegistryHandle,
    correlator: Arc<ExecutionCorrelator>,
    trigger: Arc<dyn TriggerPort>,
    registry_task: JoinHandle<()>,
    ingress_task: JoinHandle<()>,
}

impl SchedulerSystem {
    /// Start the scheduler core.
    ///
    /// Order matters: the registry actor starts first so the snapshot replay
    /// has somewhere to land, the snapshot is replayed before the live feed
    /// is consumed, and only then does the ingress consumer start.
    pub async fn start<C>(
        config: &SchedulerConfig,
        connector: &C,
        snapshot: &dyn SnapshotSource,
        trigger: Arc<dyn TriggerPort>,
    ) -> Result<Self>
    where
        C: BusConnector,
        C::Source: 'static,
    {
        logging::init_structured_logging();
        config.validate()?;

        let dispatcher = Dispatcher::new(
            Arc::clone(&trigger),
            config.trigger_retries,
            config.trigger_backoff(),
        );
        let (registry, registry_task) =
            TriggerRegistry::spawn(dispatcher, config.command_channel_capacity);

        let replayed = bootstrap::replay_snapshot_with_retry(
            snapshot,
            &registry,
            config.connection_retries,
            config.connection_backoff(),
        )
        .await?;

        let source = connect_with_retry(
            connector,
            config.connection_retries,
            config.connection_backoff(),
        )
        .await?;

        let correlator = Arc::new(ExecutionCorrelator::new(
            config.correlation_attempts,
            config.correlation_backoff(),
        ));
        let consumer = IngressConsumer::new(registry.clone(), Arc::clone(&correlator));
        let ingress_task = tokio::spawn(consumer.run(source));

        info!(replayed, "🚀 Scheduler system started");

        Ok(Self {
            registry,
            correlator,
            trigger,
            registry_task,
            ingress_task,
        })
    }

    /// Handle for applying config commands (e.g. from an admin surface)
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Correlator shared with the ingress consumer
    pub fn correlator(&self) -> Arc<ExecutionCorrelator> {
        Arc::clone(&self.correlator)
    }

    /// Build an import runner over this system's correlator and trigger port
    pub fn import_runner(&self, resolver: Arc<dyn PipelineResolver>) -> ImportRunner {
        ImportRunner::new(
            Arc::clone(&self.correlator),
            resolver,
            Arc::clone(&self.trigger),
        )
    }

    /// Snapshot of all scheduled triggers
    pub async fn triggers(&self) -> Result<Vec<TriggerEntrySnapshot>> {
        Ok(self.registry.snapshot().await?)
    }

    /// Stop the registry actor and the ingress consumer
    pub async fn shutdown(self) {
        if self.registry.shutdown().await.is_err() {
            warn!("Trigger registry already stopped");
        }
        if self.registry_task.await.is_err() {
            warn!("Trigger registry task ended abnormally");
        }
        // the consumer may be parked in recv(); it holds no state worth draining
        self.ingress_task.abort();
        info!("🛑 Scheduler system stopped");
    }
}
