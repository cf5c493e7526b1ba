//! Periodic status lines for both roles.

use std::time::Duration;

use tokio::sync::{broadcast, watch};

use camlink_services::{CoordinateStore, FrameStats, LatestFrame};

const PRINT_INTERVAL: Duration = Duration::from_secs(5);

pub async fn producer_printer(
    stats: FrameStats,
    store: CoordinateStore,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(PRINT_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = interval.tick() => {}
        }
        let snap = stats.snapshot();
        let cursor = store.read();
        tracing::info!(
            fps = format_args!("{:.1}", snap.fps),
            frames_sent = snap.total_frames,
            x = cursor.x,
            y = cursor.y,
            commands = store.command_count(),
            "producer status"
        );
    }
}

pub async fn viewer_printer(
    latest: watch::Receiver<Option<LatestFrame>>,
    stats: FrameStats,
    coords: CoordinateStore,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(PRINT_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = interval.tick() => {}
        }
        let snap = stats.snapshot();
        let cursor = coords.read();
        let reassembly = latest.borrow().as_ref().map(|f| (f.reassembly, f.decode_failures));
        match reassembly {
            Some((r, decode_failures)) => tracing::info!(
                fps = format_args!("{:.1}", snap.fps),
                frames = snap.total_frames,
                timed_out = r.timed_out,
                evicted = r.evicted,
                duplicates = r.duplicates,
                stale = r.stale_dropped,
                decode_failures,
                x = cursor.x,
                y = cursor.y,
                "viewer status"
            ),
            None => tracing::info!(x = cursor.x, y = cursor.y, "viewer status: no frames received"),
        }
    }
}
