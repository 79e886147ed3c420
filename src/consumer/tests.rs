//! Consumer tests against loopback peers

use super::*;
use crate::peer::CommandSender;
use crate::test_utils::MockVehicle;
use proptest::prelude::*;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

fn loopback_config() -> ConsumerConfig {
    ConsumerConfig {
        listen_address: "127.0.0.1:0".to_string(),
        retry_backoff_ms: 50,
        ..ConsumerConfig::default()
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {}", what);
}

async fn connect(consumer: &CommandConsumer) -> CommandSender<TcpStream> {
    CommandSender::new(TcpStream::connect(consumer.local_addr()).await.unwrap())
}

#[tokio::test]
async fn applies_received_command() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();
    let mut peer = connect(&consumer).await;

    peer.send_line("0.5,1.0,0.0").await.unwrap();
    wait_until("command", || consumer.stats().accepted == 1).await;

    let mut vehicle = MockVehicle::new();
    let applied = consumer.apply_tick(&mut vehicle);

    assert_eq!(applied, ControlSnapshot::new(0.5, 1.0, 0.0));
    assert_eq!(vehicle.controls, applied);
    assert!(vehicle.engine_running);
    assert!(vehicle.external_control);
    assert_eq!(vehicle.handbrake, 0.0);

    consumer.shutdown().await;
}

#[tokio::test]
async fn invalid_line_keeps_previous_command() {
    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();
    let mut peer = connect(&consumer).await;

    peer.send_line("0.25,0.5,0.0").await.unwrap();
    peer.send_line("2.0,-1.0,abc").await.unwrap();
    wait_until("rejection", || consumer.stats().rejected == 1).await;

    assert_eq!(consumer.latest(), InboundCommand::new(0.25, 0.5, 0.0));
    let mut vehicle = MockVehicle::new();
    assert_eq!(consumer.apply_tick(&mut vehicle), ControlSnapshot::new(0.25, 0.5, 0.0));

    consumer.shutdown().await;
}

#[tokio::test]
async fn out_of_range_command_is_clamped_on_apply() {
    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();
    let mut peer = connect(&consumer).await;

    peer.send(InboundCommand::new(3.0, -2.0, 1.5)).await.unwrap();
    wait_until("command", || consumer.stats().accepted == 1).await;

    // Stored as received, clamped only when applied
    assert_eq!(consumer.latest(), InboundCommand::new(3.0, -2.0, 1.5));
    let mut vehicle = MockVehicle::new();
    assert_eq!(consumer.apply_tick(&mut vehicle), ControlSnapshot::new(1.0, 0.0, 1.0));

    consumer.shutdown().await;
}

#[tokio::test]
async fn serves_new_peer_after_disconnect() {
    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();

    let mut first = connect(&consumer).await;
    first.send_line("0.1,0.1,0.1").await.unwrap();
    wait_until("first command", || consumer.stats().accepted == 1).await;
    drop(first);
    wait_until("disconnect", || consumer.state() == ConnectionState::Disconnected).await;

    let mut second = connect(&consumer).await;
    second.send_line("-0.7,0.3,0.0").await.unwrap();
    wait_until("second command", || consumer.stats().accepted == 2).await;

    assert_eq!(consumer.latest(), InboundCommand::new(-0.7, 0.3, 0.0));
    assert_eq!(consumer.stats().clients, 2);

    consumer.shutdown().await;
}

#[tokio::test]
async fn second_concurrent_peer_is_rejected() {
    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();

    let mut first = connect(&consumer).await;
    wait_until("first peer", || consumer.state() == ConnectionState::Connected).await;

    let mut intruder = TcpStream::connect(consumer.local_addr()).await.unwrap();
    wait_until("refusal", || consumer.stats().refused == 1).await;

    let mut buf = [0u8; 8];
    let read = tokio::time::timeout(Duration::from_secs(2), intruder.read(&mut buf))
        .await
        .expect("rejected peer was not closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    // The active peer is unaffected
    first.send_line("0.0,1.0,0.0").await.unwrap();
    wait_until("command", || consumer.stats().accepted == 1).await;
    assert_eq!(consumer.stats().clients, 1);

    consumer.shutdown().await;
}

#[tokio::test]
async fn overlong_line_is_discarded_and_reading_continues() {
    let config = ConsumerConfig { max_line_length: 16, ..loopback_config() };
    let mut consumer = CommandConsumer::bind(&config).await.unwrap();
    let mut peer = connect(&consumer).await;

    peer.send_line(&format!("0.5,{},0.0", "1".repeat(64))).await.unwrap();
    peer.send_line("0.5,0.5,0.5").await.unwrap();
    wait_until("valid command", || consumer.stats().accepted == 1).await;

    assert!(consumer.stats().rejected >= 1);
    assert_eq!(consumer.latest(), InboundCommand::new(0.5, 0.5, 0.5));

    consumer.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_listener_and_keeps_last_command() {
    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();
    let addr = consumer.local_addr();
    let mut peer = connect(&consumer).await;

    peer.send_line("0.2,0.4,0.0").await.unwrap();
    wait_until("command", || consumer.stats().accepted == 1).await;

    tokio::time::timeout(Duration::from_secs(2), consumer.shutdown())
        .await
        .expect("shutdown did not unblock the accept task");
    assert_eq!(consumer.state(), ConnectionState::Disconnected);
    assert!(TcpStream::connect(addr).await.is_err());

    let mut vehicle = MockVehicle::new();
    assert_eq!(consumer.apply_tick(&mut vehicle), ControlSnapshot::new(0.2, 0.4, 0.0));
}

#[tokio::test]
async fn apply_tick_reasserts_external_control_every_tick() {
    let mut consumer = CommandConsumer::bind(&loopback_config()).await.unwrap();
    let mut vehicle = MockVehicle::new();

    // No command yet: the vehicle idles at zero input
    assert_eq!(consumer.apply_tick(&mut vehicle), ControlSnapshot::default());

    for _ in 0..3 {
        vehicle.reclaim_input();
        consumer.apply_tick(&mut vehicle);
        assert!(vehicle.external_control);
    }

    assert_eq!(vehicle.external_control_asserts, 4);
    assert_eq!(vehicle.engine_starts, 1);

    consumer.shutdown().await;
}

#[tokio::test]
async fn bind_conflict_is_connection_error() {
    let mut first = CommandConsumer::bind(&loopback_config()).await.unwrap();
    let taken = ConsumerConfig {
        listen_address: first.local_addr().to_string(),
        ..loopback_config()
    };

    let result = CommandConsumer::bind(&taken).await;
    assert!(matches!(result, Err(BridgeError::Connection { .. })));

    first.shutdown().await;
}

proptest! {
    #[test]
    fn invalid_lines_never_change_latest_command(
        fields in prop::collection::vec("[-0-9.eE]{0,6}|[a-z]{1,4}", 0..6),
    ) {
        let shared = CommandShared::default();
        shared.ingest("0.5,0.5,0.5").unwrap();

        let line = fields.join(",");
        if shared.ingest(&line).is_err() {
            prop_assert_eq!(shared.latest(), InboundCommand::new(0.5, 0.5, 0.5));
        } else {
            prop_assert_eq!(fields.len(), 3);
        }
    }

    #[test]
    fn wrong_field_count_is_always_rejected(
        values in prop::collection::vec(-10.0f32..10.0, 0..8),
    ) {
        prop_assume!(values.len() != 3);
        let shared = CommandShared::default();
        let line = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");

        prop_assert!(shared.ingest(&line).is_err());
        prop_assert_eq!(shared.latest(), InboundCommand::default());
    }
}
