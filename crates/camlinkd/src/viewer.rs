//! Viewer role: receive loop, cursor sync, and the HTTP viewer.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, watch};

use camlink_core::config::CamlinkConfig;
use camlink_services::socket::resolve;
use camlink_services::{CommandClient, CoordinateStore, FrameReceiver, ReassemblerConfig};

use crate::status;

pub async fn run(config: CamlinkConfig, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    // Video channel
    let video_addr = resolve(&config.network.video_bind())
        .with_context(|| format!("cannot resolve {}", config.network.video_bind()))?;
    let receiver = FrameReceiver::bind(
        video_addr,
        ReassemblerConfig::from_stream(&config.stream),
        config.network.socket_buffer_bytes,
    )
    .with_context(|| format!("failed to bind video socket on {video_addr}"))?;
    let frame_stats = receiver.frame_stats();
    let (latest_tx, latest_rx) = watch::channel(None);

    // Command channel
    let command_addr = resolve(&config.network.command_target())
        .with_context(|| format!("cannot resolve producer {}", config.network.command_target()))?;
    let client = CommandClient::new(command_addr, config.command.client_timeout());
    let coords = CoordinateStore::new();

    let api_addr: SocketAddr = resolve(&format!(
        "{}:{}",
        config.network.bind_host, config.network.api_port
    ))
    .context("cannot resolve API address")?;

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let receiver_task = tokio::spawn(receiver.run(shutdown_tx.subscribe(), latest_tx));

    let sync_task = tokio::spawn(sync_loop(
        client.clone(),
        coords.clone(),
        Duration::from_secs(config.command.sync_interval_secs),
        shutdown_tx.subscribe(),
    ));

    let api_task = {
        let state = camlink_api::ApiState {
            latest: latest_rx.clone(),
            coords: coords.clone(),
            client,
        };
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = camlink_api::serve(state, api_addr, shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    let stats_printer = tokio::spawn(status::viewer_printer(
        latest_rx,
        frame_stats,
        coords,
        shutdown_tx.subscribe(),
    ));

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = receiver_task      => tracing::error!("frame receiver exited: {:?}", r),
        r = sync_task          => tracing::error!("coordinate sync exited: {:?}", r),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
        r = stats_printer      => tracing::error!("stats printer exited: {:?}", r),
    }

    Ok(())
}

/// Periodically read the producer's cursor into the local mirror. An
/// interval of zero disables syncing.
async fn sync_loop(
    client: CommandClient,
    coords: CoordinateStore,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    if every.is_zero() {
        let _ = shutdown.recv().await;
        return;
    }

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = interval.tick() => {}
        }
        match client.sync().await {
            Ok(current) => {
                coords.set(current);
                tracing::debug!(x = current.x, y = current.y, "cursor synced");
            }
            Err(e) => tracing::warn!(producer = %client.addr(), error = %e, "cursor sync failed"),
        }
    }
}
