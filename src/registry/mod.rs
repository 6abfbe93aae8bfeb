//! # Trigger Registry
//!
//! Single-writer store of one trigger entry per datasource, fused with the
//! scheduler loop that fires them.
//!
//! ## Design
//!
//! All entries live inside one actor task ([`TriggerRegistry`]) fed by an
//! mpsc command channel. That single task also owns a min-heap of armed
//! deadlines and sleeps against the earliest one, so:
//!
//! - commands for the same datasource apply strictly in the order they were
//!   issued (the bus preserves per-routing-key order),
//! - commands for different datasources interleave freely without locks,
//! - disarming is race-free: it happens on the same task that fires, and a
//!   stale heap entry is recognized by its generation and skipped.
//!
//! Per-datasource OS timers do not scale and make cancellation racy; one
//! heap plus one sleep replaces them all.

pub mod commands;
pub mod entry;
pub mod scheduler_loop;

pub use commands::{RegistryCommand, RegistryError, RegistryHandle};
pub use entry::{TriggerEntry, TriggerEntrySnapshot};
pub use scheduler_loop::TriggerRegistry;
