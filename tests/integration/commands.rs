use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use camlink_core::config::StreamConfig;
use camlink_core::Direction;
use camlink_services::{
    CaptureLoop, CommandClient, CoordinateStore, Coordinates, TestPatternSource,
};

use crate::*;

async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    reply
}

fn as_json(reply: &[u8]) -> Value {
    serde_json::from_slice(reply).unwrap()
}

#[tokio::test]
async fn test_move_then_sync_from_a_new_connection() {
    let producer = start_producer(CoordinateStore::new()).unwrap();

    let reply = exchange(producer.addr, br#"{"direction":"RIGHT"}"#).await;
    assert_eq!(
        as_json(&reply),
        json!({"status":"ok","x":1,"y":0,"type":"move_response"})
    );

    let reply = exchange(producer.addr, br#"{"sync":true}"#).await;
    assert_eq!(
        as_json(&reply),
        json!({"status":"ok","x":1,"y":0,"type":"sync_response"})
    );
    assert_eq!(producer.store.command_count(), 2);
}

#[tokio::test]
async fn test_text_protocol_round_trip() {
    let producer = start_producer(CoordinateStore::new()).unwrap();

    assert_eq!(exchange(producer.addr, b"LEFT").await, b"-1,0");
    assert_eq!(exchange(producer.addr, b"bawah\n").await, b"-1,-1");
    assert_eq!(exchange(producer.addr, b"BERHENTI").await, b"ERROR");
    assert_eq!(producer.store.read(), Coordinates { x: -1, y: -1 });
}

#[tokio::test]
async fn test_malformed_request_gets_error_and_connection_closes() {
    let producer = start_producer(CoordinateStore::new()).unwrap();

    let reply = as_json(&exchange(producer.addr, br#"{"direction":"#).await);
    assert_eq!(reply["status"], "error");
    assert!(reply["message"].is_string());

    // The server is still serving afterwards.
    assert_eq!(exchange(producer.addr, b"UP").await, b"0,1");
}

#[tokio::test]
async fn test_concurrent_clients_lose_no_moves() {
    let producer = start_producer(CoordinateStore::new()).unwrap();

    // The listen backlog is tiny, so refused SYNs may need a retransmit.
    let client = CommandClient::new(producer.addr, Duration::from_secs(10));
    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let direction = if i % 2 == 0 { Direction::Right } else { Direction::Up };
                client.send_direction(direction).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(producer.store.read(), Coordinates { x: 6, y: 6 });
    assert_eq!(producer.store.command_count(), 12);
    assert_eq!(
        producer.client().sync().await.unwrap(),
        Coordinates { x: 6, y: 6 }
    );
}

#[tokio::test]
async fn test_stalled_client_only_delays_the_next_one() {
    let producer = start_producer(CoordinateStore::new()).unwrap();

    let _stalled = TcpStream::connect(producer.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    let coords = producer.client().send_direction(Direction::Down).await.unwrap();
    assert_eq!(coords, Coordinates { x: 0, y: -1 });
    assert!(
        started.elapsed() < RECEIVE_TIMEOUT + Duration::from_millis(500),
        "waited {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_commands_are_served_while_streaming() {
    let producer = start_producer(CoordinateStore::new()).unwrap();
    let mut receiver = receiver().unwrap();
    let sender = sender_to(receiver.local_addr().unwrap(), 1400).unwrap();
    let capture = CaptureLoop::new(
        Box::new(TestPatternSource::new(30_000)),
        sender,
        &StreamConfig::default(),
    );
    let (shutdown, rx) = broadcast::channel(1);
    let capture_task = tokio::spawn(capture.run(rx));

    let client = producer.client();
    for _ in 0..10 {
        client.send_direction(Direction::Left).await.unwrap();
    }
    let frame = receiver.recv_frame(Duration::from_secs(2)).await.unwrap();
    assert!(frame.is_some());

    assert_eq!(client.sync().await.unwrap(), Coordinates { x: -10, y: 0 });

    shutdown.send(()).unwrap();
    capture_task.await.unwrap();
}
