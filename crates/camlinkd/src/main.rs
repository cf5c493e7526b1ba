//! camlinkd: camlink daemon.
//!
//! `camlinkd producer` captures frames, streams them to the peer, and serves
//! the command channel. `camlinkd viewer` reassembles the stream, mirrors the
//! producer's cursor, and serves the HTTP viewer.

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;

use camlink_core::config::CamlinkConfig;

mod producer;
mod status;
mod viewer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = CamlinkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    // Load config. An unreadable file falls back to defaults; a bad setting stops startup.
    let path = CamlinkConfig::file_path();
    let file = CamlinkConfig::read_file(&path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CamlinkConfig::default()
    });
    let config = file.resolve().context("invalid configuration")?;

    let role = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "viewer".to_string());
    tracing::info!(role, config = %path.display(), "camlinkd starting");

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    match role.as_str() {
        "producer" => producer::run(config, shutdown_tx).await,
        "viewer" => viewer::run(config, shutdown_tx).await,
        other => bail!("unknown role {other:?}; expected \"producer\" or \"viewer\""),
    }
}
