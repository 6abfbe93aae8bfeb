//! The registry actor and its scheduler loop.
//!
//! One task owns every [`TriggerEntry`] plus a min-heap of armed deadlines,
//! sleeps against the earliest deadline and applies inbound commands in
//! arrival order. Fires are handled on the same task, so a cancel applied
//! before a due time always wins, and a fire never observes half-applied
//! state.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::Utc;
use futures::future::{pending, Either};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::commands::{RegistryCommand, RegistryHandle};
use super::entry::TriggerEntry;
use crate::dispatch::Dispatcher;
use crate::messaging::{DatasourceConfig, TriggerSpec};

/// An armed deadline in the scheduling heap.
///
/// Ordering is by due time (then generation, then id, for determinism); the
/// heap holds `Reverse<ArmedDeadline>` so the earliest deadline is on top.
/// A heap entry whose generation no longer matches its registry entry is
/// stale and skipped, which is how disarming works without touching the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ArmedDeadline {
    due: Instant,
    generation: u64,
    entity_id: i64,
}

/// Single-writer trigger registry fused with the scheduler loop
pub struct TriggerRegistry {
    rx: mpsc::Receiver<RegistryCommand>,
    entries: HashMap<i64, TriggerEntry>,
    deadlines: BinaryHeap<Reverse<ArmedDeadline>>,
    dispatcher: Dispatcher,
    generation_counter: u64,
}

impl TriggerRegistry {
    /// Create the registry and its command handle without starting the loop.
    ///
    /// Mostly useful for tests that want to drive the actor synchronously;
    /// production code uses [`TriggerRegistry::spawn`].
    pub fn new(dispatcher: Dispatcher, channel_capacity: usize) -> (Self, RegistryHandle) {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let registry = Self {
            rx,
            entries: HashMap::new(),
            deadlines: BinaryHeap::new(),
            dispatcher,
            generation_counter: 0,
        };
        (registry, RegistryHandle::new(tx))
    }

    /// Start the actor loop on a new task
    pub fn spawn(
        dispatcher: Dispatcher,
        channel_capacity: usize,
    ) -> (RegistryHandle, JoinHandle<()>) {
        let (registry, handle) = Self::new(dispatcher, channel_capacity);
        let task = tokio::spawn(registry.run());
        (handle, task)
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(mut self) {
        info!("🚀 Trigger registry started");
        loop {
            self.drop_stale_deadlines();
            let wakeup = self.deadlines.peek().map(|Reverse(deadline)| deadline.due);
            let next_fire = match wakeup {
                Some(due) => Either::Left(sleep_until(due)),
                None => Either::Right(pending::<()>()),
            };

            tokio::select! {
                maybe_cmd = self.rx.recv() => {
                    match maybe_cmd {
                        Some(RegistryCommand::Shutdown) | None => break,
                        Some(cmd) => self.apply(cmd),
                    }
                }
                _ = next_fire => {
                    self.fire_due();
                }
            }
        }
        info!("🛑 Trigger registry stopped");
    }

    /// Apply one command; fires are not commands, they are handled by the
    /// same task in [`Self::fire_due`]
    fn apply(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Upsert { config } => self.upsert(config),
            RegistryCommand::Remove { entity_id } => self.remove(entity_id),
            RegistryCommand::Snapshot { reply } => {
                let now = Instant::now();
                let mut entries: Vec<_> =
                    self.entries.values().map(|e| e.snapshot(now)).collect();
                entries.sort_by_key(|s| s.entity_id);
                let _ = reply.send(entries);
            }
            RegistryCommand::Shutdown => {}
        }
    }

    /// Create or fully replace the entry for a datasource.
    ///
    /// Replacement discards the old spec entirely and bumps the generation,
    /// which disarms the previous deadline.
    fn upsert(&mut self, config: DatasourceConfig) {
        if config.trigger.periodic && config.trigger.interval == 0 {
            warn!(
                entity_id = config.id,
                "Periodic trigger with zero interval - clamping to 1ms"
            );
        }

        let now = Instant::now();
        let deadline = Self::initial_deadline(&config.trigger, now);
        self.generation_counter += 1;
        let generation = self.generation_counter;
        let entity_id = config.id;

        let replaced = self
            .entries
            .insert(
                entity_id,
                TriggerEntry {
                    entity_id,
                    spec: config.trigger,
                    next_fire_at: deadline,
                    generation,
                    armed: true,
                    fires: 0,
                },
            )
            .is_some();

        self.deadlines.push(Reverse(ArmedDeadline {
            due: deadline,
            generation,
            entity_id,
        }));

        info!(
            entity_id,
            replaced,
            fire_in_ms = deadline.saturating_duration_since(now).as_millis() as u64,
            "Datasource trigger scheduled"
        );
    }

    /// Disarm and drop the entry if present; deletes may race ahead of a
    /// not-yet-applied create, so an unknown id is a no-op
    fn remove(&mut self, entity_id: i64) {
        if self.entries.remove(&entity_id).is_some() {
            info!(entity_id, "Datasource trigger removed");
        } else {
            debug!(entity_id, "Remove for unknown datasource - doing nothing");
        }
    }

    /// Fire every deadline that is due, dispatching and re-arming periodic
    /// entries
    fn fire_due(&mut self) {
        let now = Instant::now();
        while let Some(Reverse(head)) = self.deadlines.peek().copied() {
            if head.due > now {
                break;
            }
            self.deadlines.pop();

            let Some(entry) = self.entries.get_mut(&head.entity_id) else {
                continue; // removed while armed
            };
            if entry.generation != head.generation {
                continue; // rescheduled while armed
            }

            entry.fires += 1;
            entry.armed = false;
            debug!(
                entity_id = head.entity_id,
                fires = entry.fires,
                "Trigger fired - dispatching"
            );
            // detached; the loop must never wait on the downstream call
            self.dispatcher.dispatch(head.entity_id);

            if entry.spec.periodic {
                let interval = entry.spec.interval_duration();
                // advance from the due time, skipping wakeups the loop
                // slept through, so cadence stays aligned without bursts
                let mut next = head.due + interval;
                while next <= now {
                    next += interval;
                }

                self.generation_counter += 1;
                let generation = self.generation_counter;
                entry.generation = generation;
                entry.next_fire_at = next;
                entry.armed = true;
                self.deadlines.push(Reverse(ArmedDeadline {
                    due: next,
                    generation,
                    entity_id: head.entity_id,
                }));
            } else {
                debug!(
                    entity_id = head.entity_id,
                    "Trigger is not periodic - removing it from scheduling"
                );
                self.entries.remove(&head.entity_id);
            }
        }
    }

    /// Pop disarmed heap heads so the loop never sleeps against a dead
    /// deadline
    fn drop_stale_deadlines(&mut self) {
        while let Some(Reverse(head)) = self.deadlines.peek().copied() {
            let live = self
                .entries
                .get(&head.entity_id)
                .is_some_and(|entry| entry.generation == head.generation);
            if live {
                break;
            }
            self.deadlines.pop();
        }
    }

    /// Overdue first executions fire immediately; future ones at their
    /// wall-clock moment, converted once onto the monotonic clock
    fn initial_deadline(spec: &TriggerSpec, now: Instant) -> Instant {
        let wall_now = Utc::now();
        if spec.first_execution <= wall_now {
            now
        } else {
            let delay = (spec.first_execution - wall_now).to_std().unwrap_or_default();
            now + delay
        }
    }
}
