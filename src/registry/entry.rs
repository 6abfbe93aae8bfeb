//! Trigger entry state owned by the registry actor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::messaging::TriggerSpec;

/// Scheduling state for one datasource.
///
/// Exclusively owned and mutated by [`crate::registry::TriggerRegistry`];
/// at most one entry exists per datasource id, and at most one armed
/// deadline (the one matching `generation`) is live for it.
#[derive(Debug, Clone)]
pub struct TriggerEntry {
    pub entity_id: i64,
    pub spec: TriggerSpec,
    /// Monotonic deadline of the pending fire; meaningful while `armed`
    pub next_fire_at: Instant,
    /// Identifies the live heap deadline; older generations are stale
    pub generation: u64,
    pub armed: bool,
    /// Fires dispatched since this entry was (re)created
    pub fires: u64,
}

/// Point-in-time view of an entry for observability and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerEntrySnapshot {
    pub entity_id: i64,
    pub first_execution: DateTime<Utc>,
    pub periodic: bool,
    pub interval_ms: u64,
    pub armed: bool,
    pub fires: u64,
    /// Milliseconds until the pending fire, if armed
    pub next_fire_in_ms: Option<u64>,
}

impl TriggerEntry {
    pub fn snapshot(&self, now: Instant) -> TriggerEntrySnapshot {
        TriggerEntrySnapshot {
            entity_id: self.entity_id,
            first_execution: self.spec.first_execution,
            periodic: self.spec.periodic,
            interval_ms: self.spec.interval,
            armed: self.armed,
            fires: self.fires,
            next_fire_in_ms: self
                .armed
                .then(|| self.next_fire_at.saturating_duration_since(now).as_millis() as u64),
        }
    }
}
