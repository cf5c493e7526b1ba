//! Receive loop: datagrams in, validated frames out.
//!
//! Owns the video socket and the reassembler. Socket waits are bounded by the
//! open slot's deadline, so an incomplete frame is discarded on time even
//! when the sender has gone quiet.

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};

use camlink_core::wire::MAX_DATAGRAM_PAYLOAD;

use crate::codec::{FrameDecoder, JpegDecoder};
use crate::fragmenter::TransportError;
use crate::reassembler::{CompletedFrame, Reassembler, ReassemblerConfig, ReassemblerStats};
use crate::socket::bind_udp;
use crate::stats::{FrameStats, StatsSnapshot};

/// How long `run` waits per `recv_frame` call before re-checking shutdown.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after a socket error before receiving again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// The most recent frame that reassembled and decoded cleanly.
#[derive(Debug, Clone)]
pub struct LatestFrame {
    pub frame_id: u32,
    pub data: Bytes,
    pub received_at: SystemTime,
    /// Frames delivered since the receiver started.
    pub counter: u64,
    pub stats: StatsSnapshot,
    pub reassembly: ReassemblerStats,
    pub decode_failures: u64,
}

pub struct FrameReceiver {
    socket: UdpSocket,
    reassembler: Reassembler,
    decoder: Box<dyn FrameDecoder>,
    stats: FrameStats,
    counter: u64,
    decode_failures: u64,
    buf: Vec<u8>,
}

impl FrameReceiver {
    pub fn bind(
        addr: SocketAddr,
        config: ReassemblerConfig,
        buffer_bytes: usize,
    ) -> io::Result<Self> {
        Ok(Self::from_socket(bind_udp(addr, buffer_bytes)?, config))
    }

    pub fn from_socket(socket: UdpSocket, config: ReassemblerConfig) -> Self {
        Self {
            socket,
            reassembler: Reassembler::new(config),
            decoder: Box::new(JpegDecoder),
            stats: FrameStats::new(),
            counter: 0,
            decode_failures: 0,
            buf: vec![0u8; MAX_DATAGRAM_PAYLOAD],
        }
    }

    pub fn with_decoder(mut self, decoder: impl FrameDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Shared handle to the consumer-side fps tracker.
    pub fn frame_stats(&self) -> FrameStats {
        self.stats.clone()
    }

    pub fn reassembler_stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    /// Wait up to `timeout` for the next frame that reassembles and decodes.
    ///
    /// `Ok(None)` means the timeout passed without a complete frame. Frames
    /// that fail decoding are logged and skipped.
    pub async fn recv_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<CompletedFrame>, TransportError> {
        let give_up_at = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            self.reassembler.expire(now);
            if now >= give_up_at {
                return Ok(None);
            }

            let wake_at = match self.reassembler.next_deadline() {
                Some(deadline) => deadline.min(give_up_at),
                None => give_up_at,
            };
            let wait = wake_at.saturating_duration_since(now);

            let len = match tokio::time::timeout(wait, self.socket.recv_from(&mut self.buf)).await
            {
                Ok(Ok((len, _peer))) => len,
                Ok(Err(e)) => return Err(TransportError::Receive(e)),
                Err(_) => continue,
            };

            let frame = match self.reassembler.on_datagram(&self.buf[..len], Instant::now()) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::trace!(error = %e, "datagram discarded");
                    continue;
                }
            };

            match self.decoder.decode(&frame.data) {
                Ok(decoded) => {
                    self.counter += 1;
                    self.stats.tick();
                    tracing::debug!(
                        frame_id = frame.frame_id,
                        bytes = decoded.len,
                        fragments = frame.fragment_count,
                        assembly_us = frame.assembly_time.as_micros() as u64,
                        "frame received"
                    );
                    return Ok(Some(frame));
                }
                Err(e) => {
                    self.decode_failures += 1;
                    tracing::debug!(frame_id = frame.frame_id, error = %e, "frame failed to decode");
                }
            }
        }
    }

    /// Receive until shutdown, publishing each good frame to `latest`.
    pub async fn run(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
        latest: watch::Sender<Option<LatestFrame>>,
    ) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, "frame receiver listening");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                result = self.recv_frame(POLL_INTERVAL) => match result {
                    Ok(Some(frame)) => {
                        latest.send_replace(Some(LatestFrame {
                            frame_id: frame.frame_id,
                            data: frame.data,
                            received_at: SystemTime::now(),
                            counter: self.counter,
                            stats: self.stats.snapshot(),
                            reassembly: self.reassembler.stats(),
                            decode_failures: self.decode_failures,
                        }));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "video receive failed");
                        tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        let stats = self.reassembler.stats();
        tracing::info!(
            frames = self.counter,
            timed_out = stats.timed_out,
            evicted = stats.evicted,
            decode_failures = self.decode_failures,
            "frame receiver stopped"
        );
    }
}
