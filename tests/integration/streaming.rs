use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use camlink_core::config::StreamConfig;
use camlink_services::{
    fragment_frame, CaptureLoop, FrameDecoder, FrameSource, JpegDecoder, TestPatternSource,
};

use crate::fault::{drop_every_nth_fragment, drop_fragment, relay};
use crate::*;

fn test_frame(bytes: usize) -> bytes::Bytes {
    TestPatternSource::new(bytes)
        .next_frame()
        .expect("test pattern never fails")
        .expect("test pattern always has a frame")
}

#[tokio::test]
async fn test_capture_loop_streams_to_receiver() {
    let mut receiver = receiver().unwrap();
    let sender = sender_to(receiver.local_addr().unwrap(), 1400).unwrap();
    let config = StreamConfig {
        target_fps: 60,
        ..StreamConfig::default()
    };
    let capture = CaptureLoop::new(Box::new(TestPatternSource::new(20_000)), sender, &config);
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(capture.run(rx));

    let mut last_id = None;
    for _ in 0..5 {
        let frame = receiver
            .recv_frame(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("frame within 2s");
        assert_eq!(frame.data.len(), 20_000);
        assert_eq!(frame.fragment_count, 15);
        JpegDecoder.decode(&frame.data).unwrap();
        if let Some(prev) = last_id {
            assert!(frame.frame_id > prev, "ids go forward: {prev} then {}", frame.frame_id);
        }
        last_id = Some(frame.frame_id);
    }

    shutdown.send(()).unwrap();
    task.await.unwrap();
    assert_eq!(receiver.frame_stats().snapshot().total_frames, 5);
}

#[tokio::test]
async fn test_reordered_and_duplicated_fragments_reassemble() {
    let mut receiver = receiver().unwrap();
    let target = receiver.local_addr().unwrap();
    let socket = UdpSocket::bind(LOOPBACK).await.unwrap();

    let frame = test_frame(12_000);
    let plan = fragment_frame(&frame, 17, 1000).unwrap();
    socket.send_to(&plan.metadata.encode(), target).await.unwrap();
    for datagram in plan.fragments.iter().rev() {
        socket.send_to(datagram, target).await.unwrap();
    }
    socket.send_to(&plan.fragments[3], target).await.unwrap();

    let got = receiver
        .recv_frame(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("frame reassembles");
    assert_eq!(got.frame_id, 17);
    assert_eq!(got.data, frame);

    // The late duplicate belongs to a closed frame and yields nothing.
    let again = receiver.recv_frame(Duration::from_millis(150)).await.unwrap();
    assert!(again.is_none());
    assert_eq!(receiver.frame_stats().snapshot().total_frames, 1);
}

#[tokio::test]
async fn test_lost_fragment_discards_only_that_frame() {
    let mut receiver = receiver().unwrap();
    let relay = relay(receiver.local_addr().unwrap(), drop_fragment(0, 2))
        .await
        .unwrap();
    let sender = sender_to(relay.addr, 1000).unwrap();

    let frame = test_frame(8_000);
    sender.send(&frame, 0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    sender.send(&frame, 1).await.unwrap();

    let got = receiver
        .recv_frame(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("second frame arrives");
    assert_eq!(got.frame_id, 1);
    assert_eq!(got.data, frame);
    assert_eq!(relay.dropped(), 1);

    let stats = receiver.reassembler_stats();
    assert_eq!(stats.evicted + stats.timed_out, 1);
    assert_eq!(stats.frames_completed, 1);
}

#[tokio::test]
async fn test_newest_frame_wins_over_stragglers() {
    let mut receiver = receiver().unwrap();
    let target = receiver.local_addr().unwrap();
    let socket = UdpSocket::bind(LOOPBACK).await.unwrap();

    let old = fragment_frame(&test_frame(5_000), 100, 1000).unwrap();
    let new_frame = test_frame(4_000);
    let new = fragment_frame(&new_frame, 101, 1000).unwrap();

    socket.send_to(&old.metadata.encode(), target).await.unwrap();
    for datagram in &old.fragments[..2] {
        socket.send_to(datagram, target).await.unwrap();
    }
    socket.send_to(&new.metadata.encode(), target).await.unwrap();
    for datagram in &new.fragments {
        socket.send_to(datagram, target).await.unwrap();
    }
    for datagram in &old.fragments[2..] {
        socket.send_to(datagram, target).await.unwrap();
    }

    let got = receiver
        .recv_frame(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("newer frame completes");
    assert_eq!(got.frame_id, 101);
    assert_eq!(got.data, new_frame);

    let nothing = receiver.recv_frame(Duration::from_millis(200)).await.unwrap();
    assert!(nothing.is_none(), "evicted frame must never complete");

    let stats = receiver.reassembler_stats();
    assert_eq!(stats.evicted, 1);
    assert_eq!(stats.stale_dropped, (old.fragments.len() - 2) as u64);
}

#[tokio::test]
async fn test_heavy_loss_never_emits_frames() {
    let mut receiver = receiver().unwrap();
    let relay = relay(receiver.local_addr().unwrap(), drop_every_nth_fragment(3))
        .await
        .unwrap();
    let sender = sender_to(relay.addr, 1000).unwrap();

    // Fragment 0 of every frame is dropped, so nothing can complete.
    let frame = test_frame(6_000);
    for id in 0..10 {
        sender.send(&frame, id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let got = receiver.recv_frame(Duration::from_millis(400)).await.unwrap();
    assert!(got.is_none());
    assert!(relay.dropped() >= 10);
    assert_eq!(receiver.decode_failures(), 0);

    let stats = receiver.reassembler_stats();
    assert_eq!(stats.frames_completed, 0);
    assert_eq!(stats.evicted + stats.timed_out, 10);
}

#[tokio::test]
async fn test_large_fragments_on_loopback() {
    let mut receiver = receiver().unwrap();
    let sender = sender_to(receiver.local_addr().unwrap(), 8_000).unwrap();

    let frame = test_frame(50_000);
    sender.send(&frame, 9).await.unwrap();

    let got = receiver
        .recv_frame(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("frame arrives");
    assert_eq!(got.fragment_count, 7);
    assert_eq!(got.data, frame);
}
