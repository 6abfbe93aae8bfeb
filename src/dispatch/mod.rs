//! # Trigger Dispatch
//!
//! Fire-and-forget invocation of the external "trigger datasource"
//! capability. The scheduler loop hands a datasource id to the dispatcher
//! and moves on; each dispatch runs on its own task with a bounded retry
//! policy. A failed fire is logged and swallowed - it must never delay or
//! cancel the schedule.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Errors returned by the external trigger capability
#[derive(Debug, thiserror::Error)]
pub enum TriggerPortError {
    #[error("trigger endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("trigger rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// The outbound "trigger datasource" capability.
///
/// Implemented by the adapter-service client collaborator; tests use
/// recording mocks.
#[async_trait]
pub trait TriggerPort: Send + Sync {
    async fn trigger_datasource(&self, datasource_id: i64) -> Result<(), TriggerPortError>;
}

/// Detached dispatch with bounded retries and fixed backoff
#[derive(Clone)]
pub struct Dispatcher {
    port: Arc<dyn TriggerPort>,
    attempts: u32,
    backoff: Duration,
}

impl Dispatcher {
    pub fn new(port: Arc<dyn TriggerPort>, attempts: u32, backoff: Duration) -> Self {
        Self {
            port,
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Trigger a datasource on a detached task; returns immediately.
    ///
    /// The caller (the scheduler loop) is never blocked or failed by the
    /// downstream call.
    pub fn dispatch(&self, datasource_id: i64) {
        let port = Arc::clone(&self.port);
        let attempts = self.attempts;
        let backoff = self.backoff;

        tokio::spawn(async move {
            for attempt in 1..=attempts {
                match port.trigger_datasource(datasource_id).await {
                    Ok(()) => {
                        info!(datasource_id, attempt, "Datasource triggered");
                        return;
                    }
                    Err(e) if attempt == attempts => {
                        error!(datasource_id, attempts, error = %e, "Could not trigger datasource");
                        return;
                    }
                    Err(e) => {
                        warn!(
                            datasource_id,
                            attempt,
                            attempts,
                            error = %e,
                            "Triggering datasource failed - retrying"
                        );
                        sleep(backoff).await;
                    }
                }
            }
        });
    }
}
