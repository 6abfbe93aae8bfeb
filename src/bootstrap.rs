//! # Startup Snapshot Replay
//!
//! Schedule state lives only in memory, so a restart would silently forget
//! every trigger until new config events arrive. Before consuming live
//! deltas, the full set of current datasources is replayed from the
//! authoritative configuration service into the trigger registry.
//!
//! Replay retries with a fixed backoff; exhausting the attempts is fatal to
//! process startup. A scheduler that starts without its state is wrong, not
//! degraded.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::messaging::DatasourceConfig;
use crate::registry::RegistryHandle;

/// Authoritative source of the current datasource configurations
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_datasources(&self) -> Result<Vec<DatasourceConfig>, SnapshotError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot source unreachable: {0}")]
    Unreachable(String),

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to replay datasource snapshot after {attempts} attempts: {last_error}")]
    SnapshotExhausted {
        attempts: u32,
        last_error: SnapshotError,
    },

    #[error("trigger registry unavailable during startup replay")]
    RegistryUnavailable,
}

/// Fetch the current datasources and upsert them all into the registry,
/// retrying the fetch with bounded attempts and fixed backoff.
///
/// Returns the number of datasources replayed.
pub async fn replay_snapshot_with_retry(
    source: &dyn SnapshotSource,
    registry: &RegistryHandle,
    attempts: u32,
    backoff: Duration,
) -> Result<usize, BootstrapError> {
    let attempts = attempts.max(1);
    let mut last_error = SnapshotError::Unreachable("no attempt made".to_string());

    for attempt in 1..=attempts {
        match source.fetch_datasources().await {
            Ok(datasources) => {
                let count = datasources.len();
                info!(count, "Received datasource snapshot - replaying into registry");
                for datasource in datasources {
                    registry
                        .upsert(datasource)
                        .await
                        .map_err(|_| BootstrapError::RegistryUnavailable)?;
                }
                info!(count, "Startup snapshot replay complete");
                return Ok(count);
            }
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Failed to sync with configuration service on startup - retrying"
                );
                last_error = e;
                if attempt < attempts {
                    sleep(backoff).await;
                }
            }
        }
    }

    Err(BootstrapError::SnapshotExhausted {
        attempts,
        last_error,
    })
}
