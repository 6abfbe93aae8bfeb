//! # Execution Correlator
//!
//! Bridges a synchronous import request to the execution-result event that
//! arrives later and independently on the bus.
//!
//! ## The lost-wakeup race
//!
//! The completion event can overtake the request flow: the downstream import
//! may finish and publish its result before the requesting side ever gets to
//! register interest. The fix is a reservation protocol: [`begin`] reserves a
//! slot for the key *before* any external call is made, so a completion
//! always finds either a reservation to fulfill or nothing at all (in which
//! case it is dropped and logged, never an error). Do not reorder this to
//! "call first, register wait after".
//!
//! ## Serialization
//!
//! Operations on different keys proceed fully concurrently; operations on
//! the same key are serialized by the concurrent map's per-key entry locking.
//! Waiting is a bounded poll loop on the caller's task - a timed-out wait
//! removes the reservation so a late completion cannot resurrect stale state.
//!
//! [`begin`]: ExecutionCorrelator::begin

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info};

/// Pipeline (or datasource) id used to match completions to requests
pub type CorrelationKey = i64;

/// Terminal result of a correlated execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(Value),
    Failure(String),
}

#[derive(Debug)]
enum SlotState {
    Reserved,
    Fulfilled(ExecutionOutcome),
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
}

/// Handle returned by [`ExecutionCorrelator::begin`]; consumed by
/// [`ExecutionCorrelator::wait`] or [`ExecutionCorrelator::abort`]
#[derive(Debug)]
pub struct PendingExecution {
    key: CorrelationKey,
    slot: Arc<Slot>,
}

impl PendingExecution {
    pub fn key(&self) -> CorrelationKey {
        self.key
    }
}

/// Errors surfaced to the requesting caller
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("an execution for key {0} is already in flight")]
    DuplicateReservation(CorrelationKey),

    #[error("no completion received for key {key} within {waited_ms}ms")]
    Timeout { key: CorrelationKey, waited_ms: u64 },
}

/// Maps correlation keys to pending result slots
pub struct ExecutionCorrelator {
    slots: DashMap<CorrelationKey, Arc<Slot>>,
    max_attempts: u32,
    poll_interval: Duration,
}

impl ExecutionCorrelator {
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            max_attempts: max_attempts.max(1),
            poll_interval,
        }
    }

    /// Atomically reserve a slot for `key`.
    ///
    /// Must be called before the external trigger call is made. A second
    /// reservation while one is live is a caller error and rejected as a
    /// conflict.
    pub fn begin(&self, key: CorrelationKey) -> Result<PendingExecution, CorrelationError> {
        match self.slots.entry(key) {
            Entry::Occupied(_) => Err(CorrelationError::DuplicateReservation(key)),
            Entry::Vacant(vacant) => {
                let slot = Arc::new(Slot {
                    state: Mutex::new(SlotState::Reserved),
                });
                vacant.insert(Arc::clone(&slot));
                debug!(key, "Execution slot reserved");
                Ok(PendingExecution { key, slot })
            }
        }
    }

    /// Fulfill the reservation for `key` with a success payload.
    ///
    /// A completion with no matching reservation (late event after a timeout
    /// cleaned up, or an import this instance never started) is dropped and
    /// logged; it must never fail the consumer.
    pub fn complete(&self, key: CorrelationKey, data: Value) {
        self.resolve(key, ExecutionOutcome::Success(data));
    }

    /// Fulfill the reservation for `key` with a failure outcome
    pub fn fail(&self, key: CorrelationKey, error: String) {
        self.resolve(key, ExecutionOutcome::Failure(error));
    }

    fn resolve(&self, key: CorrelationKey, outcome: ExecutionOutcome) {
        match self.slots.remove(&key) {
            Some((_, slot)) => {
                *slot.state.lock() = SlotState::Fulfilled(outcome);
                debug!(key, "Execution slot fulfilled");
            }
            None => {
                info!(key, "Dropping completion event with no matching reservation");
            }
        }
    }

    /// Release a reservation whose external call never happened (resolve or
    /// trigger failed before waiting started)
    pub fn abort(&self, pending: PendingExecution) {
        self.slots
            .remove_if(&pending.key, |_, slot| Arc::ptr_eq(slot, &pending.slot));
        debug!(key = pending.key, "Execution slot aborted");
    }

    /// Wait until the slot is fulfilled or the poll budget is spent.
    ///
    /// Check-then-sleep with a fixed backoff, bounded by
    /// `max_attempts * poll_interval`; suspends only the calling task. On
    /// timeout the reservation is removed so a late completion is dropped.
    pub async fn wait(
        &self,
        pending: PendingExecution,
    ) -> Result<ExecutionOutcome, CorrelationError> {
        if let Some(outcome) = Self::take_outcome(&pending.slot) {
            return Ok(outcome);
        }

        for _ in 0..self.max_attempts {
            sleep(self.poll_interval).await;
            if let Some(outcome) = Self::take_outcome(&pending.slot) {
                return Ok(outcome);
            }
        }

        // remove only our own reservation, in case the key was already
        // completed and re-reserved by someone else
        self.slots
            .remove_if(&pending.key, |_, slot| Arc::ptr_eq(slot, &pending.slot));
        let waited_ms = self.max_attempts as u64 * self.poll_interval.as_millis() as u64;
        info!(key = pending.key, waited_ms, "Timed out waiting for execution result");
        Err(CorrelationError::Timeout {
            key: pending.key,
            waited_ms,
        })
    }

    fn take_outcome(slot: &Slot) -> Option<ExecutionOutcome> {
        let mut state = slot.state.lock();
        match std::mem::replace(&mut *state, SlotState::Reserved) {
            SlotState::Fulfilled(outcome) => Some(outcome),
            SlotState::Reserved => None,
        }
    }

    /// Number of live reservations (observability)
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }
}
