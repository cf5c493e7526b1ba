//! Rolling frame-rate statistics.
//!
//! Every produced or consumed frame calls `tick`. Once a full second has
//! elapsed since the window opened, fps is recomputed as `count / elapsed`
//! and a new window starts. Purely advisory: nothing in the protocol reads it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Length of one averaging window.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct FpsTracker {
    window_start: Instant,
    count_in_window: u64,
    fps: f64,
    total_frames: u64,
    last_frame_at: Option<Instant>,
}

/// Point-in-time copy of the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub fps: f64,
    pub frame_count_in_window: u64,
    pub window_start: Instant,
    pub total_frames: u64,
    pub last_frame_at: Option<Instant>,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            count_in_window: 0,
            fps: 0.0,
            total_frames: 0,
            last_frame_at: None,
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.count_in_window += 1;
        self.total_frames += 1;
        self.last_frame_at = Some(now);

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.count_in_window as f64 / elapsed.as_secs_f64();
            self.count_in_window = 0;
            self.window_start = now;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fps: self.fps,
            frame_count_in_window: self.count_in_window,
            window_start: self.window_start,
            total_frames: self.total_frames,
            last_frame_at: self.last_frame_at,
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracker shared between the loop that ticks it and whoever reports it.
#[derive(Clone, Default)]
pub struct FrameStats {
    inner: Arc<Mutex<FpsTracker>>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) {
        self.lock().tick();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, FpsTracker> {
        // The tracker holds plain counters, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
