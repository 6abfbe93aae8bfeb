//! # Import Execution Flow
//!
//! Serves a synchronous "run this pipeline now" request: reserve a
//! correlation slot, resolve the pipeline to its datasource, trigger the
//! datasource, then wait for the execution-result event routed in by the
//! ingress consumer.
//!
//! The reservation happens strictly before the resolve/trigger calls so a
//! completion racing ahead of the waiter cannot be lost. Errors here are
//! propagated to the original caller - unlike schedule-side dispatch
//! failures, they represent an unmet client expectation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::correlator::{CorrelationError, ExecutionCorrelator, ExecutionOutcome};
use crate::dispatch::{TriggerPort, TriggerPortError};

/// Resolves a pipeline id to the datasource feeding it (external capability)
#[async_trait]
pub trait PipelineResolver: Send + Sync {
    async fn datasource_for_pipeline(&self, pipeline_id: i64) -> Result<i64, ResolveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("pipeline {0} does not exist")]
    UnknownPipeline(i64),

    #[error("pipeline service unreachable: {0}")]
    Unreachable(String),
}

/// Errors surfaced to the import requester
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("an import for pipeline {0} is already in flight")]
    Busy(i64),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("datasource trigger failed: {0}")]
    Trigger(#[from] TriggerPortError),

    #[error("import for pipeline {0} did not complete in time")]
    Timeout(i64),

    #[error("import for pipeline {pipeline_id} failed: {message}")]
    Failed { pipeline_id: i64, message: String },
}

/// Drives one import request end to end
pub struct ImportRunner {
    correlator: Arc<ExecutionCorrelator>,
    resolver: Arc<dyn PipelineResolver>,
    trigger: Arc<dyn TriggerPort>,
}

impl ImportRunner {
    pub fn new(
        correlator: Arc<ExecutionCorrelator>,
        resolver: Arc<dyn PipelineResolver>,
        trigger: Arc<dyn TriggerPort>,
    ) -> Self {
        Self {
            correlator,
            resolver,
            trigger,
        }
    }

    /// Run an import for `pipeline_id` and return the execution payload.
    ///
    /// Reserve-before-call: the correlation slot exists before the trigger
    /// request leaves this process. If resolve or trigger fails, the
    /// reservation is released immediately so the key is not stuck until a
    /// timeout.
    pub async fn run_import(&self, pipeline_id: i64) -> Result<Value, ImportError> {
        let pending = self
            .correlator
            .begin(pipeline_id)
            .map_err(|_| ImportError::Busy(pipeline_id))?;

        let datasource_id = match self.resolver.datasource_for_pipeline(pipeline_id).await {
            Ok(id) => id,
            Err(e) => {
                warn!(pipeline_id, error = %e, "Pipeline resolution failed - releasing reservation");
                self.correlator.abort(pending);
                return Err(e.into());
            }
        };

        if let Err(e) = self.trigger.trigger_datasource(datasource_id).await {
            warn!(pipeline_id, datasource_id, error = %e, "Datasource trigger failed - releasing reservation");
            self.correlator.abort(pending);
            return Err(e.into());
        }

        info!(pipeline_id, datasource_id, "Import triggered - awaiting execution result");

        match self.correlator.wait(pending).await {
            Ok(ExecutionOutcome::Success(data)) => Ok(data),
            Ok(ExecutionOutcome::Failure(message)) => Err(ImportError::Failed {
                pipeline_id,
                message,
            }),
            Err(CorrelationError::Timeout { .. }) => Err(ImportError::Timeout(pipeline_id)),
            Err(CorrelationError::DuplicateReservation(_)) => {
                // wait never returns this; keep the caller contract total
                Err(ImportError::Busy(pipeline_id))
            }
        }
    }
}
