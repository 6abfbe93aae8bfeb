//! # Bus Messaging
//!
//! The decode contract between the message bus and the scheduler core, plus
//! the ingress consumer that routes decoded events to the trigger registry
//! and the execution correlator.
//!
//! Transport setup (broker connections, exchanges, queue bindings) belongs to
//! an external collaborator; this module only fixes the seam: an
//! [`EventSource`] yields raw deliveries, [`decode_event`] turns a routing
//! key and JSON body into a typed [`IngressEvent`], and [`IngressConsumer`]
//! applies them.

pub mod events;
pub mod ingress;

pub use events::{
    decode_event, routing_keys, DatasourceConfig, DatasourceConfigEvent, DatasourceDeletedEvent,
    ExecutionResultEvent, IngressEvent, TriggerSpec,
};
pub use ingress::{connect_with_retry, BusConnector, EventSource, IngressConsumer, RawDelivery};

/// Errors raised while decoding or consuming bus events
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("malformed {routing_key} payload: {source}")]
    Malformed {
        routing_key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bus connection failed: {0}")]
    Connection(String),

    #[error("could not establish bus connection after {attempts} attempts: {last_error}")]
    ConnectionExhausted { attempts: u32, last_error: String },
}
