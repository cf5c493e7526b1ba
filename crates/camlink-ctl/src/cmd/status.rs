//! `stats` and `coords`: read the viewer's HTTP surface.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
#[serde(untagged)]
enum StatsResponse {
    Streaming {
        fps: f64,
        last_update: f64,
        total_frames: u64,
        #[serde(default)]
        timed_out: u64,
        #[serde(default)]
        evicted: u64,
        #[serde(default)]
        decode_failures: u64,
    },
    Idle {
        status: String,
    },
}

#[derive(Deserialize)]
struct CoordsResponse {
    x: i64,
    y: i64,
}

pub async fn cmd_stats(host: &str, port: u16) -> Result<()> {
    let resp: StatsResponse = get_json(&format!("{}/stats", base_url(host, port))).await?;

    println!("═══════════════════════════════════════");
    println!("  camlink Viewer Stats");
    println!("═══════════════════════════════════════");
    match resp {
        StatsResponse::Streaming {
            fps,
            last_update,
            total_frames,
            timed_out,
            evicted,
            decode_failures,
        } => {
            println!("  FPS              : {fps:.1}");
            println!("  Frames received  : {total_frames}");
            println!("  Last frame       : {last_update:.2}s ago");
            println!("  Timed out        : {timed_out}");
            println!("  Evicted          : {evicted}");
            println!("  Decode failures  : {decode_failures}");
        }
        StatsResponse::Idle { status } => println!("  {status}"),
    }
    Ok(())
}

pub async fn cmd_coords(host: &str, port: u16) -> Result<()> {
    let resp: CoordsResponse = get_json(&format!("{}/coords", base_url(host, port))).await?;
    println!("viewer cursor at ({}, {})", resp.x, resp.y);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_body_parses_streaming_and_idle_shapes() {
        let streaming: StatsResponse = serde_json::from_str(
            r#"{"fps":29.7,"last_update":0.04,"total_frames":12,"frame_id":11}"#,
        )
        .unwrap();
        assert!(matches!(
            streaming,
            StatsResponse::Streaming { total_frames: 12, timed_out: 0, .. }
        ));

        let idle: StatsResponse =
            serde_json::from_str(r#"{"status":"no frames received"}"#).unwrap();
        assert!(matches!(idle, StatsResponse::Idle { status } if status == "no frames received"));
    }
}
