//! # Ingest Scheduler
//!
//! Scheduling and correlation core for a data-ingestion platform whose
//! services communicate over a message bus.
//!
//! ## Overview
//!
//! Datasource configurations carry a *trigger*: when the first import should
//! run, whether it repeats, and at which interval. Configuration changes
//! arrive asynchronously as created/updated/deleted events. This crate keeps
//! exactly one live timer per datasource and fires the external "trigger
//! datasource" capability at the right moments, and it correlates synchronous
//! import requests with the execution-result events that arrive later on the
//! bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌─────────────────┐    ┌──────────────┐    ┌───────────┐
//! │ Bus        │───▶│ IngressConsumer │───▶│ Trigger      │───▶│ Dispatcher│
//! │ (external) │    │ (decode, route) │    │ Registry     │    │ (retry,   │
//! └────────────┘    └────────┬────────┘    │ (actor loop) │    │  detach)  │
//!                            │             └──────────────┘    └───────────┘
//!                            ▼
//!                   ┌─────────────────┐    ┌──────────────┐
//!                   │ Execution       │◀───│ ImportRunner │◀── HTTP request
//!                   │ Correlator      │    │ (reserve →   │
//!                   │ (slot per key)  │    │  trigger →   │
//!                   └─────────────────┘    │  wait)       │
//!                                          └──────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`messaging`] - Typed bus events, the decode contract and the ingress consumer
//! - [`registry`] - Single-writer trigger registry and the scheduler loop
//! - [`dispatch`] - Fire-and-forget invocation of the trigger capability
//! - [`correlator`] - Reservation slots bridging requests to completion events
//! - [`execution`] - The import-request flow built on the correlator
//! - [`bootstrap`] - Snapshot replay of current datasources at startup
//! - [`config`] - Environment-backed configuration
//! - [`error`] - Crate-level error aggregation
//!
//! ## Concurrency model
//!
//! All trigger state is owned by one actor task ([`registry::TriggerRegistry`]);
//! commands for the same datasource are applied strictly in order while
//! different datasources never block each other. Downstream trigger calls are
//! detached tasks and are never awaited by the scheduler loop. The correlator
//! is an independent serialization domain keyed by pipeline id.

pub mod bootstrap;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod system;

pub use bootstrap::{BootstrapError, SnapshotError, SnapshotSource};
pub use config::{ConfigurationError, SchedulerConfig};
pub use correlator::{
    CorrelationError, CorrelationKey, ExecutionCorrelator, ExecutionOutcome, PendingExecution,
};
pub use dispatch::{Dispatcher, TriggerPort, TriggerPortError};
pub use error::{Result, SchedulerError};
pub use execution::{ImportError, ImportRunner, PipelineResolver, ResolveError};
pub use messaging::{
    decode_event, BusConnector, DatasourceConfig, EventSource, IngressConsumer, IngressError,
    IngressEvent, RawDelivery, TriggerSpec,
};
pub use registry::{RegistryError, RegistryHandle, TriggerEntrySnapshot, TriggerRegistry};
pub use system::SchedulerSystem;
