//! Shared fixtures for integration tests: a channel-backed bus, a recording
//! trigger port, and wire-event builders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use ingest_scheduler::{
    BusConnector, EventSource, IngressError, RawDelivery, SnapshotError, SnapshotSource,
    TriggerPort, TriggerPortError,
};

/// Trigger port that records every dispatched datasource id
pub struct RecordingPort {
    fired: Mutex<Vec<i64>>,
}

impl RecordingPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fired: Mutex::new(Vec::new()),
        })
    }

    pub fn fired(&self) -> Vec<i64> {
        self.fired.lock().clone()
    }

    pub fn fire_count(&self, datasource_id: i64) -> usize {
        self.fired
            .lock()
            .iter()
            .filter(|id| **id == datasource_id)
            .count()
    }
}

#[async_trait]
impl TriggerPort for RecordingPort {
    async fn trigger_datasource(&self, datasource_id: i64) -> Result<(), TriggerPortError> {
        self.fired.lock().push(datasource_id);
        Ok(())
    }
}

pub struct ChannelSource(mpsc::Receiver<RawDelivery>);

#[async_trait]
impl EventSource for ChannelSource {
    async fn recv(&mut self) -> Option<RawDelivery> {
        self.0.recv().await
    }
}

/// Connector that hands out one pre-built channel source
pub struct OnceConnector {
    source: AsyncMutex<Option<ChannelSource>>,
}

impl OnceConnector {
    pub fn new() -> (Self, mpsc::Sender<RawDelivery>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Self {
                source: AsyncMutex::new(Some(ChannelSource(rx))),
            },
            tx,
        )
    }
}

#[async_trait]
impl BusConnector for OnceConnector {
    type Source = ChannelSource;

    async fn connect(&self) -> Result<Self::Source, IngressError> {
        self.source
            .lock()
            .await
            .take()
            .ok_or_else(|| IngressError::Connection("source already taken".to_string()))
    }
}

/// Snapshot source for systems that start empty
pub struct EmptySnapshot;

#[async_trait]
impl SnapshotSource for EmptySnapshot {
    async fn fetch_datasources(
        &self,
    ) -> Result<Vec<ingest_scheduler::DatasourceConfig>, SnapshotError> {
        Ok(Vec::new())
    }
}

/// Wire event for `datasource.config.created` / `.updated`
pub fn config_event(
    routing_key: &str,
    id: i64,
    first_in_ms: i64,
    periodic: bool,
    interval_ms: u64,
) -> RawDelivery {
    let first_execution = Utc::now() + ChronoDuration::milliseconds(first_in_ms);
    let body = json!({
        "datasource": {
            "id": id,
            "trigger": {
                "firstExecution": first_execution.to_rfc3339(),
                "periodic": periodic,
                "interval": interval_ms,
            }
        }
    });
    RawDelivery::new(routing_key, body.to_string().into_bytes())
}

pub fn deleted_event(id: i64) -> RawDelivery {
    let body = json!({ "datasource": { "id": id } });
    RawDelivery::new("datasource.config.deleted", body.to_string().into_bytes())
}

pub fn execution_success_event(pipeline_id: i64, data: serde_json::Value) -> RawDelivery {
    let body = json!({ "pipelineId": pipeline_id, "data": data });
    RawDelivery::new("pipeline.execution.success", body.to_string().into_bytes())
}

pub fn execution_failed_event(pipeline_id: i64, error: &str) -> RawDelivery {
    let body = json!({ "pipelineId": pipeline_id, "error": error });
    RawDelivery::new("pipeline.execution.failed", body.to_string().into_bytes())
}

/// Let consumer/actor/dispatch tasks catch up on the paused runtime
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Step the paused clock forward, letting tasks run at each step so
/// periodic re-arms and poll loops are observed on the way
pub async fn advance_stepped(total: Duration, step: Duration) {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        let chunk = remaining.min(step);
        tokio::time::advance(chunk).await;
        settle().await;
        remaining -= chunk;
    }
}
