//! Client side of the command channel.
//!
//! One TCP connection per command: connect, write a JSON request, read the
//! reply until the server closes. Connect and read share one timeout.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use camlink_core::command::{
    Direction, JsonRequest, JsonResponse, ResponseStatus, ResponseType, MAX_REQUEST_BYTES,
};

use crate::coordinates::Coordinates;

#[derive(Debug, Clone)]
pub struct CommandClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl CommandClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Move the producer's cursor one step and return where it ended up.
    pub async fn send_direction(&self, direction: Direction) -> Result<Coordinates, ClientError> {
        let response = self.exchange(&JsonRequest::direction(direction)).await?;
        expect_coordinates(response, ResponseType::MoveResponse)
    }

    /// Read the producer's cursor without moving it.
    pub async fn sync(&self) -> Result<Coordinates, ClientError> {
        let response = self.exchange(&JsonRequest::sync()).await?;
        expect_coordinates(response, ResponseType::SyncResponse)
    }

    async fn exchange(&self, request: &JsonRequest) -> Result<JsonResponse, ClientError> {
        let body = serde_json::to_vec(request).map_err(|e| ClientError::Malformed(e.to_string()))?;

        let raw = tokio::time::timeout(self.timeout, async {
            let mut stream = TcpStream::connect(self.addr).await?;
            stream.write_all(&body).await?;
            let mut raw = Vec::with_capacity(128);
            (&mut stream)
                .take(MAX_REQUEST_BYTES as u64)
                .read_to_end(&mut raw)
                .await?;
            Ok::<_, std::io::Error>(raw)
        })
        .await
        .map_err(|_| ClientError::Timeout(self.timeout))?
        .map_err(ClientError::Io)?;

        if raw.is_empty() {
            return Err(ClientError::NoReply);
        }
        serde_json::from_slice(&raw).map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

fn expect_coordinates(
    response: JsonResponse,
    expected: ResponseType,
) -> Result<Coordinates, ClientError> {
    if response.status == ResponseStatus::Error {
        return Err(ClientError::Rejected(
            response
                .message
                .unwrap_or_else(|| "no message".to_string()),
        ));
    }
    if response.kind.is_some_and(|kind| kind != expected) {
        return Err(ClientError::Malformed(format!(
            "expected {expected:?}, got {:?}",
            response.kind
        )));
    }
    match (response.x, response.y) {
        (Some(x), Some(y)) => Ok(Coordinates { x, y }),
        _ => Err(ClientError::Malformed("reply carries no coordinates".into())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("command channel I/O: {0}")]
    Io(#[source] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("server closed the connection without replying")]
    NoReply,

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("server rejected the command: {0}")]
    Rejected(String),
}
