//! Ingress consumer: drives an [`EventSource`] and routes decoded events.
//!
//! Config events go to the trigger registry, execution results to the
//! correlator. One bad message is logged and skipped; the consumer only stops
//! when the source closes or the registry shuts down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{decode_event, IngressEvent};
use super::IngressError;
use crate::correlator::ExecutionCorrelator;
use crate::registry::RegistryHandle;

/// A raw delivery as handed over by the bus collaborator
#[derive(Debug, Clone)]
pub struct RawDelivery {
    pub routing_key: String,
    pub payload: Vec<u8>,
}

impl RawDelivery {
    pub fn new(routing_key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload: payload.into(),
        }
    }
}

/// Stream of raw deliveries from the bus.
///
/// Implemented by the transport collaborator; tests back it with a channel.
#[async_trait]
pub trait EventSource: Send {
    /// Next delivery, or `None` once the source is closed
    async fn recv(&mut self) -> Option<RawDelivery>;
}

/// Establishes an [`EventSource`]; the seam for broker connection setup
#[async_trait]
pub trait BusConnector: Send + Sync {
    type Source: EventSource;

    async fn connect(&self) -> Result<Self::Source, IngressError>;
}

/// Connect to the bus with bounded attempts and fixed backoff.
///
/// Exhausting the attempts is fatal to startup: a scheduler with no event
/// feed is silently wrong, not degraded.
pub async fn connect_with_retry<C: BusConnector>(
    connector: &C,
    attempts: u32,
    backoff: Duration,
) -> Result<C::Source, IngressError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match connector.connect().await {
            Ok(source) => {
                info!(attempt, "Successfully connected to event bus");
                return Ok(source);
            }
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Error connecting to event bus - retrying"
                );
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    error!(attempts, "Could not establish connection to event bus");
    Err(IngressError::ConnectionExhausted {
        attempts,
        last_error,
    })
}

/// Decodes deliveries and applies them to the registry and correlator
pub struct IngressConsumer {
    registry: RegistryHandle,
    correlator: Arc<ExecutionCorrelator>,
}

impl IngressConsumer {
    pub fn new(registry: RegistryHandle, correlator: Arc<ExecutionCorrelator>) -> Self {
        Self {
            registry,
            correlator,
        }
    }

    /// Consume the source until it closes
    pub async fn run<S: EventSource>(self, mut source: S) {
        while let Some(delivery) = source.recv().await {
            self.handle_delivery(delivery).await;
        }
        info!("Event source closed - ingress consumer stopping");
    }

    async fn handle_delivery(&self, delivery: RawDelivery) {
        let delivery_id = Uuid::new_v4();
        debug!(
            %delivery_id,
            routing_key = %delivery.routing_key,
            bytes = delivery.payload.len(),
            "Consuming bus event"
        );

        let event = match decode_event(&delivery.routing_key, &delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(%delivery_id, error = %e, "Failed to decode bus event - skipping");
                return;
            }
        };

        match event {
            IngressEvent::DatasourceCreated(config) | IngressEvent::DatasourceUpdated(config) => {
                if let Err(e) = self.registry.upsert(config).await {
                    error!(%delivery_id, error = %e, "Trigger registry rejected config event");
                }
            }
            IngressEvent::DatasourceDeleted { datasource_id } => {
                if let Err(e) = self.registry.remove(datasource_id).await {
                    error!(%delivery_id, error = %e, "Trigger registry rejected delete event");
                }
            }
            IngressEvent::ExecutionSucceeded { pipeline_id, data } => {
                self.correlator.complete(pipeline_id, data);
            }
            IngressEvent::ExecutionFailed { pipeline_id, error } => {
                self.correlator.fail(pipeline_id, error);
            }
            IngressEvent::Unhandled { routing_key } => {
                debug!(%delivery_id, %routing_key, "Received unsubscribed event - doing nothing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyConnector {
        fail_first: u32,
        calls: AtomicU32,
    }

    #[derive(Debug)]
    struct ChannelSource(tokio::sync::mpsc::Receiver<RawDelivery>);

    #[async_trait]
    impl EventSource for ChannelSource {
        async fn recv(&mut self) -> Option<RawDelivery> {
            self.0.recv().await
        }
    }

    #[async_trait]
    impl BusConnector for FlakyConnector {
        type Source = ChannelSource;

        async fn connect(&self) -> Result<Self::Source, IngressError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(IngressError::Connection("broker refused".to_string()))
            } else {
                let (_tx, rx) = tokio::sync::mpsc::channel(1);
                Ok(ChannelSource(rx))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_succeeds_after_transient_failures() {
        let connector = FlakyConnector {
            fail_first: 2,
            calls: AtomicU32::new(0),
        };
        let result = connect_with_retry(&connector, 5, Duration::from_secs(3)).await;
        assert!(result.is_ok());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_exhaustion_is_fatal() {
        let connector = FlakyConnector {
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let err = connect_with_retry(&connector, 3, Duration::from_millis(10))
            .await
            .unwrap_err();
        match err {
            IngressError::ConnectionExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected ConnectionExhausted, got {other:?}"),
        }
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    // Routing of decoded events through a real registry and correlator is
    // covered by the integration tests in tests/.
}
