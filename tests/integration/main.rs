//! camlink integration test harness.
//!
//! Every test runs real sockets on 127.0.0.1 with ephemeral ports, so tests
//! can run in parallel without coordinating.
//!
//!   cargo test --test integration

mod commands;
mod fault;
mod shutdown;
mod streaming;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use camlink_services::{
    CommandClient, CommandServer, CoordinateStore, FrameReceiver, FrameSender, ReassemblerConfig,
};

// ── Harness ───────────────────────────────────────────────────────────────────

pub const LOOPBACK: &str = "127.0.0.1:0";

/// Server-side wait for a silent client.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

pub fn loopback() -> SocketAddr {
    LOOPBACK.parse().expect("loopback literal parses")
}

/// A command server on an ephemeral port, already running.
pub struct Producer {
    pub addr: SocketAddr,
    pub store: CoordinateStore,
    pub shutdown: broadcast::Sender<()>,
    pub task: tokio::task::JoinHandle<()>,
}

impl Producer {
    pub fn client(&self) -> CommandClient {
        CommandClient::new(self.addr, Duration::from_secs(2))
    }
}

pub fn start_producer(store: CoordinateStore) -> Result<Producer> {
    let server = CommandServer::bind(loopback(), store.clone(), RECEIVE_TIMEOUT)
        .context("bind command server")?;
    let addr = server.local_addr()?;
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(server.run(rx));
    Ok(Producer {
        addr,
        store,
        shutdown,
        task,
    })
}

pub fn receiver() -> Result<FrameReceiver> {
    FrameReceiver::bind(loopback(), ReassemblerConfig::default(), 1 << 20)
        .context("bind frame receiver")
}

pub fn sender_to(target: SocketAddr, max_fragment_size: usize) -> Result<FrameSender> {
    FrameSender::bind(target, max_fragment_size, 1 << 20).context("bind frame sender")
}

/// Poll `condition` every 10 ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
