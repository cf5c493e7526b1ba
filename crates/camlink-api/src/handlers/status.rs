//! /stats and /coords handlers.

use std::time::SystemTime;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use camlink_services::Coordinates;

use super::ApiState;

// ── /stats ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StatsResponse {
    Streaming {
        fps: f64,
        /// Seconds since the latest frame arrived.
        last_update: f64,
        total_frames: u64,
        frame_id: u32,
        timed_out: u64,
        evicted: u64,
        decode_failures: u64,
    },
    Idle {
        status: &'static str,
    },
}

pub async fn handle_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    let latest = state.latest.borrow();
    let response = match latest.as_ref() {
        Some(frame) => StatsResponse::Streaming {
            fps: round_tenths(frame.stats.fps),
            last_update: SystemTime::now()
                .duration_since(frame.received_at)
                .map(|age| age.as_secs_f64())
                .unwrap_or(0.0),
            total_frames: frame.counter,
            frame_id: frame.frame_id,
            timed_out: frame.reassembly.timed_out,
            evicted: frame.reassembly.evicted,
            decode_failures: frame.decode_failures,
        },
        None => StatsResponse::Idle {
            status: "no frames received",
        },
    };
    Json(response)
}

/// Round to one decimal place.
fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ── /coords ──────────────────────────────────────────────────────────────────

pub async fn handle_coords(State(state): State<ApiState>) -> Json<Coordinates> {
    Json(state.coords.read())
}
