//! Command listener: one request per TCP connection, one connection at a
//! time.
//!
//! Each accepted client gets a bounded wait for its request, a single reply in
//! the format it used, and then the connection is closed. A client that
//! connects and says nothing costs the listener at most `receive_timeout`.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use camlink_core::command::{
    parse_request, request_complete, CommandResponse, RequestFormat, MAX_REQUEST_BYTES,
};

use crate::coordinates::{Applied, CoordinateStore};
use crate::socket::bind_tcp;

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Turn one raw request into reply bytes, applying it to `store`.
///
/// Parse errors and unknown directions produce an explicit error reply; the
/// store is only touched by recognized commands.
pub fn handle_request(store: &CoordinateStore, raw: &[u8]) -> Vec<u8> {
    let (response, format) = respond(store, raw);
    response.encode(format)
}

fn respond(store: &CoordinateStore, raw: &[u8]) -> (CommandResponse, RequestFormat) {
    let request = match parse_request(raw) {
        Ok(request) => request,
        Err((format, e)) => return (CommandResponse::Rejected(e), format),
    };

    let response = match store.apply(&request.command) {
        Applied::Moved(c) => CommandResponse::Moved { x: c.x, y: c.y },
        Applied::Read(c) => CommandResponse::Synced { x: c.x, y: c.y },
        Applied::Unknown { token, current } => CommandResponse::Unknown {
            token,
            x: current.x,
            y: current.y,
        },
    };
    (response, request.format)
}

pub struct CommandServer {
    listener: TcpListener,
    store: CoordinateStore,
    receive_timeout: Duration,
}

impl CommandServer {
    pub fn bind(
        addr: SocketAddr,
        store: CoordinateStore,
        receive_timeout: Duration,
    ) -> io::Result<Self> {
        Ok(Self {
            listener: bind_tcp(addr, 1)?,
            store,
            receive_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, "command server listening");
        }

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            if let Err(e) = self.serve_connection(stream, peer).await {
                tracing::debug!(%peer, error = %e, "command connection failed");
            }
        }

        tracing::info!(
            commands = self.store.command_count(),
            "command server stopped"
        );
    }

    async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        let request = self.read_request(&mut stream).await?;
        if request.is_empty() {
            tracing::debug!(%peer, "client sent no request before timeout");
            return Ok(());
        }

        let (response, format) = respond(&self.store, &request);
        match &response {
            CommandResponse::Rejected(e) => {
                tracing::debug!(%peer, error = %e, "command rejected")
            }
            CommandResponse::Unknown { token, .. } => {
                tracing::debug!(%peer, token = %token, "unknown command")
            }
            ok => tracing::debug!(%peer, response = ?ok, "command applied"),
        }

        stream.write_all(&response.encode(format)).await?;
        stream.shutdown().await
    }

    /// Collect one request, which may arrive over several segments.
    ///
    /// Stops at a complete request, EOF, `MAX_REQUEST_BYTES`, or
    /// `receive_timeout` after accept, returning whatever arrived.
    async fn read_request(&self, stream: &mut TcpStream) -> io::Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + self.receive_timeout;
        let mut request = Vec::with_capacity(MAX_REQUEST_BYTES);
        let mut chunk = [0u8; MAX_REQUEST_BYTES];

        while request.len() < MAX_REQUEST_BYTES {
            let room = MAX_REQUEST_BYTES - request.len();
            let len = match tokio::time::timeout_at(deadline, stream.read(&mut chunk[..room])).await
            {
                Ok(result) => result?,
                Err(_) => break,
            };
            if len == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..len]);
            if request_complete(&request) {
                break;
            }
        }
        Ok(request)
    }
}
