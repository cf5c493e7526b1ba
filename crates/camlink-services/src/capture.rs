//! Capture/send loop on the producer.
//!
//! Each tick pulls one frame from the source, sends it, and sleeps whatever
//! is left of the frame interval. A tick that overruns the interval starts
//! the next one immediately; nothing queues.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use camlink_core::config::StreamConfig;
use camlink_core::FrameIdCounter;

use crate::codec::FrameSource;
use crate::fragmenter::FrameSender;
use crate::stats::FrameStats;

/// Pause after the source fails or has nothing ready.
const SOURCE_RETRY: Duration = Duration::from_millis(10);

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    sender: FrameSender,
    ids: FrameIdCounter,
    interval: Duration,
    send_error_backoff: Duration,
    stats: FrameStats,
}

impl CaptureLoop {
    pub fn new(source: Box<dyn FrameSource>, sender: FrameSender, config: &StreamConfig) -> Self {
        Self {
            source,
            sender,
            ids: FrameIdCounter::new(config.frame_id_modulus),
            interval: config.frame_interval(),
            send_error_backoff: config.send_error_backoff(),
            stats: FrameStats::new(),
        }
    }

    /// Shared handle to the producer-side fps tracker.
    pub fn frame_stats(&self) -> FrameStats {
        self.stats.clone()
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            target = %self.sender.target(),
            interval_ms = self.interval.as_millis() as u64,
            "capture loop started"
        );

        loop {
            let started = Instant::now();

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if pause(&mut shutdown, SOURCE_RETRY).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "frame source failed");
                    if pause(&mut shutdown, SOURCE_RETRY).await {
                        break;
                    }
                    continue;
                }
            };

            let frame_id = self.ids.next();
            match self.sender.send(&frame, frame_id).await {
                Ok(report) => {
                    self.stats.tick();
                    tracing::debug!(
                        frame_id,
                        fragments = report.fragments,
                        bytes = report.bytes,
                        "frame sent"
                    );
                }
                Err(e) => {
                    tracing::warn!(frame_id, error = %e, "frame send failed");
                    if pause(&mut shutdown, self.send_error_backoff).await {
                        break;
                    }
                    continue;
                }
            }

            let remaining = self.interval.saturating_sub(started.elapsed());
            if pause(&mut shutdown, remaining).await {
                break;
            }
        }

        tracing::info!(
            frames = self.stats.snapshot().total_frames,
            "capture loop stopped"
        );
    }
}

/// Sleep for `duration` unless shutdown arrives first. Returns true on
/// shutdown.
async fn pause(shutdown: &mut broadcast::Receiver<()>, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown.recv() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
