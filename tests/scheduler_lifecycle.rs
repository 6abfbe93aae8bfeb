//! End-to-end scheduling scenarios: config events in through the bus seam,
//! trigger calls out through the recording port, on tokio's paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    advance_stepped, config_event, deleted_event, settle, EmptySnapshot, OnceConnector,
    RecordingPort,
};
use ingest_scheduler::{SchedulerConfig, SchedulerSystem};

async fn start_system(
    port: Arc<RecordingPort>,
) -> (SchedulerSystem, tokio::sync::mpsc::Sender<ingest_scheduler::RawDelivery>) {
    let (connector, tx) = OnceConnector::new();
    let config = SchedulerConfig::default();
    let system = SchedulerSystem::start(&config, &connector, &EmptySnapshot, port)
        .await
        .expect("system should start");
    (system, tx)
}

#[tokio::test(start_paused = true)]
async fn one_shot_datasource_fires_exactly_once() {
    let port = RecordingPort::new();
    let (system, tx) = start_system(port.clone()).await;

    // datasource 1: one-shot, due in 2s
    tx.send(config_event("datasource.config.created", 1, 2000, false, 0))
        .await
        .unwrap();
    settle().await;

    advance_stepped(Duration::from_secs(3), Duration::from_millis(100)).await;

    assert_eq!(port.fire_count(1), 1);
    // one-shot entries leave the registry after firing
    assert!(system.triggers().await.unwrap().is_empty());

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn deleted_datasource_never_fires() {
    let port = RecordingPort::new();
    let (system, tx) = start_system(port.clone()).await;

    // datasource 2: due in 2s, deleted immediately afterwards
    tx.send(config_event("datasource.config.created", 2, 2000, false, 0))
        .await
        .unwrap();
    tx.send(deleted_event(2)).await.unwrap();
    settle().await;

    advance_stepped(Duration::from_secs(3), Duration::from_millis(100)).await;

    assert_eq!(port.fire_count(2), 0);
    assert!(system.triggers().await.unwrap().is_empty());

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn update_driven_rescheduling_does_not_stall_periodic_firing() {
    let port = RecordingPort::new();
    let (system, tx) = start_system(port.clone()).await;

    // datasource 3: periodic every 500ms, first fire in 500ms
    tx.send(config_event("datasource.config.created", 3, 500, true, 500))
        .await
        .unwrap();
    settle().await;

    // 200ms in, an update reschedules it with the same interval
    advance_stepped(Duration::from_millis(200), Duration::from_millis(100)).await;
    tx.send(config_event("datasource.config.updated", 3, 300, true, 500))
        .await
        .unwrap();
    settle().await;

    // after 4.5s total the datasource must have fired more than once
    advance_stepped(Duration::from_millis(4300), Duration::from_millis(100)).await;
    assert!(
        port.fire_count(3) > 1,
        "expected repeated fires, got {}",
        port.fire_count(3)
    );

    // exactly one entry, still armed for the next period
    let triggers = system.triggers().await.unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].entity_id, 3);
    assert!(triggers[0].armed);

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn overdue_first_execution_fires_immediately_then_keeps_cadence() {
    let port = RecordingPort::new();
    let (system, tx) = start_system(port.clone()).await;

    // first execution 5s in the past, periodic every 2s
    tx.send(config_event("datasource.config.created", 4, -5000, true, 2000))
        .await
        .unwrap();
    settle().await;

    // the overdue fire happens within a small epsilon
    advance_stepped(Duration::from_millis(100), Duration::from_millis(50)).await;
    assert_eq!(port.fire_count(4), 1);

    advance_stepped(Duration::from_secs(2), Duration::from_millis(100)).await;
    assert_eq!(port.fire_count(4), 2);

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn update_fully_replaces_previous_cadence() {
    let port = RecordingPort::new();
    let (system, tx) = start_system(port.clone()).await;

    // fast cadence first, then an update stretches it to 10s
    tx.send(config_event("datasource.config.created", 5, 100, true, 200))
        .await
        .unwrap();
    settle().await;
    advance_stepped(Duration::from_millis(700), Duration::from_millis(50)).await;
    let fires_before_update = port.fire_count(5);
    assert!(fires_before_update >= 2);

    tx.send(config_event("datasource.config.updated", 5, 10_000, true, 10_000))
        .await
        .unwrap();
    settle().await;

    // no residual fires from the old 200ms interval
    advance_stepped(Duration::from_secs(5), Duration::from_millis(250)).await;
    assert_eq!(port.fire_count(5), fires_before_update);

    // the new schedule does fire when its time comes
    advance_stepped(Duration::from_secs(6), Duration::from_millis(500)).await;
    assert_eq!(port.fire_count(5), fires_before_update + 1);

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_events_and_bad_payloads_do_not_stop_the_consumer() {
    let port = RecordingPort::new();
    let (system, tx) = start_system(port.clone()).await;

    tx.send(ingest_scheduler::RawDelivery::new(
        "notification.config.created",
        b"{}".to_vec(),
    ))
    .await
    .unwrap();
    tx.send(ingest_scheduler::RawDelivery::new(
        "datasource.config.created",
        b"not json at all".to_vec(),
    ))
    .await
    .unwrap();
    // a valid event after the garbage still lands
    tx.send(config_event("datasource.config.created", 6, 500, false, 0))
        .await
        .unwrap();
    settle().await;

    advance_stepped(Duration::from_secs(1), Duration::from_millis(100)).await;
    assert_eq!(port.fire_count(6), 1);

    system.shutdown().await;
}
