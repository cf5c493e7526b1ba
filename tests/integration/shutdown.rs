use std::time::Duration;

use tokio::sync::{broadcast, watch};

use camlink_core::config::StreamConfig;
use camlink_services::{
    CaptureLoop, CommandClient, CommandServer, CoordinateStore, Coordinates, TestPatternSource,
};

use crate::*;

const STOP_WITHIN: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_every_loop_stops_on_shutdown() {
    let receiver = receiver().unwrap();
    let video_addr = receiver.local_addr().unwrap();
    let sender = sender_to(video_addr, 1400).unwrap();
    let capture = CaptureLoop::new(
        Box::new(TestPatternSource::new(10_000)),
        sender,
        &StreamConfig::default(),
    );
    let producer = start_producer(CoordinateStore::new()).unwrap();

    let shutdown = producer.shutdown.clone();
    let (latest_tx, latest_rx) = watch::channel(None);
    let capture_task = tokio::spawn(capture.run(shutdown.subscribe()));
    let receiver_task = tokio::spawn(receiver.run(shutdown.subscribe(), latest_tx));

    // Let the link carry something before stopping it.
    wait_for(Duration::from_secs(2), || latest_rx.borrow().is_some())
        .await
        .unwrap();

    shutdown.send(()).unwrap();
    for (name, task) in [
        ("capture", capture_task),
        ("receiver", receiver_task),
        ("command server", producer.task),
    ] {
        tokio::time::timeout(STOP_WITHIN, task)
            .await
            .unwrap_or_else(|_| panic!("{name} did not stop"))
            .unwrap();
    }
}

#[tokio::test]
async fn test_command_port_is_released_after_shutdown() {
    let producer = start_producer(CoordinateStore::new()).unwrap();
    let addr = producer.addr;

    producer.shutdown.send(()).unwrap();
    tokio::time::timeout(STOP_WITHIN, producer.task)
        .await
        .unwrap()
        .unwrap();

    // SO_REUSEADDR lets a restarted producer take the same port at once.
    let server = CommandServer::bind(addr, CoordinateStore::new(), RECEIVE_TIMEOUT)
        .expect("rebind on the same port");
    let (stop, rx) = broadcast::channel(1);
    let task = tokio::spawn(server.run(rx));

    let client = CommandClient::new(addr, Duration::from_secs(2));
    assert_eq!(client.sync().await.unwrap(), Coordinates::default());

    stop.send(()).unwrap();
    task.await.unwrap();
}
