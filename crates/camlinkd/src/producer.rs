//! Producer role: capture/send loop plus the command listener.

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use camlink_core::config::CamlinkConfig;
use camlink_services::socket::resolve;
use camlink_services::{
    source_from_config, CaptureLoop, CommandServer, CoordinateStore, FrameSender,
};

use crate::status;

pub async fn run(config: CamlinkConfig, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    let store = CoordinateStore::new();

    // Video channel
    let target = resolve(&config.network.video_target())
        .with_context(|| format!("cannot resolve peer {}", config.network.video_target()))?;
    let sender = FrameSender::bind(
        target,
        config.stream.max_fragment_size,
        config.network.socket_buffer_bytes,
    )
    .context("failed to bind video socket")?;

    let source = source_from_config(&config.camera.source, config.camera.test_pattern_bytes)
        .with_context(|| format!("failed to open camera source {}", config.camera.source))?;
    tracing::info!(
        source = %config.camera.source,
        target = %target,
        fps = config.stream.target_fps,
        max_fragment_size = config.stream.max_fragment_size,
        "video stream configured"
    );

    let capture = CaptureLoop::new(source, sender, &config.stream);
    let frame_stats = capture.frame_stats();

    // Command channel
    let command_addr = resolve(&config.network.command_bind())
        .with_context(|| format!("cannot resolve {}", config.network.command_bind()))?;
    let server = CommandServer::bind(
        command_addr,
        store.clone(),
        config.command.receive_timeout(),
    )
    .with_context(|| format!("failed to bind command listener on {command_addr}"))?;

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let capture_task = tokio::spawn(capture.run(shutdown_tx.subscribe()));
    let server_task = tokio::spawn(server.run(shutdown_tx.subscribe()));
    let stats_printer = tokio::spawn(status::producer_printer(
        frame_stats,
        store,
        shutdown_tx.subscribe(),
    ));

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = capture_task       => tracing::error!("capture loop exited: {:?}", r),
        r = server_task        => tracing::error!("command server exited: {:?}", r),
        r = stats_printer      => tracing::error!("stats printer exited: {:?}", r),
    }

    Ok(())
}
