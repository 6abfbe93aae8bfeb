//! Typed bus events and the routing-key decode contract.
//!
//! Bodies are structural JSON published by the configuration and execution
//! services; field names on the wire are camelCase.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::IngressError;

/// Routing keys consumed by the scheduler core
pub mod routing_keys {
    pub const DATASOURCE_CREATED: &str = "datasource.config.created";
    pub const DATASOURCE_UPDATED: &str = "datasource.config.updated";
    pub const DATASOURCE_DELETED: &str = "datasource.config.deleted";
    pub const EXECUTION_SUCCESS: &str = "pipeline.execution.success";
    pub const EXECUTION_FAILED: &str = "pipeline.execution.failed";
}

/// When a datasource should fire: the earliest/only execution, and the
/// repetition interval if it is periodic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec {
    pub first_execution: DateTime<Utc>,
    pub periodic: bool,
    /// Repetition interval in milliseconds, meaningful only if `periodic`
    pub interval: u64,
}

impl TriggerSpec {
    /// Interval as a duration, clamped away from zero so a periodic trigger
    /// can never arm a busy loop
    pub fn interval_duration(&self) -> Duration {
        Duration::from_millis(self.interval.max(1))
    }
}

/// Datasource configuration as carried by config events and startup snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    pub id: i64,
    pub trigger: TriggerSpec,
}

/// Envelope for `datasource.config.created` / `datasource.config.updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceConfigEvent {
    pub datasource: DatasourceConfig,
}

/// Envelope for `datasource.config.deleted`; deletes carry only the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceDeletedEvent {
    pub datasource: DatasourceRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceRef {
    pub id: i64,
}

/// Envelope for `pipeline.execution.success` / `pipeline.execution.failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResultEvent {
    pub pipeline_id: i64,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A bus delivery decoded into a scheduler command
#[derive(Debug, Clone, PartialEq)]
pub enum IngressEvent {
    DatasourceCreated(DatasourceConfig),
    DatasourceUpdated(DatasourceConfig),
    DatasourceDeleted { datasource_id: i64 },
    ExecutionSucceeded { pipeline_id: i64, data: Value },
    ExecutionFailed { pipeline_id: i64, error: String },
    /// Routing key the core is not subscribed to; logged and dropped
    Unhandled { routing_key: String },
}

/// Decode a raw delivery into a typed event.
///
/// A malformed body for a known routing key is an error the caller logs and
/// skips; an unknown routing key decodes to [`IngressEvent::Unhandled`] so a
/// shared queue binding can never crash the consumer.
pub fn decode_event(routing_key: &str, payload: &[u8]) -> Result<IngressEvent, IngressError> {
    let malformed = |source| IngressError::Malformed {
        routing_key: routing_key.to_string(),
        source,
    };

    match routing_key {
        routing_keys::DATASOURCE_CREATED => {
            let event: DatasourceConfigEvent = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(IngressEvent::DatasourceCreated(event.datasource))
        }
        routing_keys::DATASOURCE_UPDATED => {
            let event: DatasourceConfigEvent = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(IngressEvent::DatasourceUpdated(event.datasource))
        }
        routing_keys::DATASOURCE_DELETED => {
            let event: DatasourceDeletedEvent = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(IngressEvent::DatasourceDeleted {
                datasource_id: event.datasource.id,
            })
        }
        routing_keys::EXECUTION_SUCCESS => {
            let event: ExecutionResultEvent = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(IngressEvent::ExecutionSucceeded {
                pipeline_id: event.pipeline_id,
                data: event.data.unwrap_or(Value::Null),
            })
        }
        routing_keys::EXECUTION_FAILED => {
            let event: ExecutionResultEvent = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(IngressEvent::ExecutionFailed {
                pipeline_id: event.pipeline_id,
                error: event
                    .error
                    .unwrap_or_else(|| "execution failed".to_string()),
            })
        }
        other => Ok(IngressEvent::Unhandled {
            routing_key: other.to_string(),
        }),
    }
}
