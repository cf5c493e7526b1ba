//! Frame fragmentation: split a compressed frame into bounded datagrams and
//! put them on the wire.
//!
//! One frame becomes a metadata datagram followed by `ceil(len / max)`
//! fragment datagrams. Sends are fire-and-forget: the first failure abandons
//! the frame and the next capture tick starts fresh. Nothing is retried.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use camlink_core::wire::{
    encode_fragment, fragment_count, FrameMetadata, MAX_FRAGMENTS_PER_FRAME, MAX_FRAGMENT_PAYLOAD,
};

use crate::socket::{any_local_for, bind_udp};

/// Everything that goes on the wire for one frame, in send order.
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub metadata: FrameMetadata,
    /// Complete fragment datagrams (header + payload), index order.
    pub fragments: Vec<Vec<u8>>,
}

/// Split `frame` into fragment datagrams of at most `max_fragment_size`
/// payload bytes each.
pub fn fragment_frame(
    frame: &[u8],
    frame_id: u32,
    max_fragment_size: usize,
) -> Result<FramePlan, FragmentError> {
    if max_fragment_size == 0 || max_fragment_size > MAX_FRAGMENT_PAYLOAD {
        return Err(FragmentError::InvalidFragmentSize(max_fragment_size));
    }
    if frame.is_empty() {
        return Err(FragmentError::EmptyFrame);
    }
    let count = fragment_count(frame.len(), max_fragment_size);
    if count > MAX_FRAGMENTS_PER_FRAME {
        return Err(FragmentError::TooManyFragments(count));
    }
    let total_size =
        u32::try_from(frame.len()).map_err(|_| FragmentError::FrameTooLarge(frame.len()))?;

    let fragments = frame
        .chunks(max_fragment_size)
        .enumerate()
        .map(|(index, payload)| encode_fragment(frame_id, index as u16, payload))
        .collect();

    Ok(FramePlan {
        metadata: FrameMetadata {
            frame_id,
            fragment_count: count as u32,
            total_size: Some(total_size),
        },
        fragments,
    })
}

/// Summary of a frame that left the socket completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub frame_id: u32,
    pub fragments: usize,
    pub bytes: usize,
}

/// Sends frames to one consumer address over UDP.
pub struct FrameSender {
    socket: UdpSocket,
    target: SocketAddr,
    max_fragment_size: usize,
}

impl FrameSender {
    /// Bind an ephemeral local socket aimed at `target`.
    pub fn bind(
        target: SocketAddr,
        max_fragment_size: usize,
        buffer_bytes: usize,
    ) -> io::Result<Self> {
        let socket = bind_udp(any_local_for(target), buffer_bytes)?;
        Ok(Self::from_socket(socket, target, max_fragment_size))
    }

    pub fn from_socket(socket: UdpSocket, target: SocketAddr, max_fragment_size: usize) -> Self {
        Self {
            socket,
            target,
            max_fragment_size,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one frame: metadata first, then every fragment in index order.
    pub async fn send(&self, frame: &[u8], frame_id: u32) -> Result<SendReport, TransportError> {
        let plan = fragment_frame(frame, frame_id, self.max_fragment_size)
            .map_err(|source| TransportError::Fragment { frame_id, source })?;

        self.socket
            .send_to(&plan.metadata.encode(), self.target)
            .await
            .map_err(|source| TransportError::Metadata { frame_id, source })?;

        for (index, datagram) in plan.fragments.iter().enumerate() {
            self.socket
                .send_to(datagram, self.target)
                .await
                .map_err(|source| TransportError::FragmentSend {
                    frame_id,
                    index,
                    source,
                })?;
        }

        tracing::trace!(
            frame_id,
            fragments = plan.fragments.len(),
            bytes = frame.len(),
            target = %self.target,
            "frame sent"
        );

        Ok(SendReport {
            frame_id,
            fragments: plan.fragments.len(),
            bytes: frame.len(),
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FragmentError {
    #[error("frame is empty")]
    EmptyFrame,

    #[error("fragment size {0} is outside 1..={}", MAX_FRAGMENT_PAYLOAD)]
    InvalidFragmentSize(usize),

    #[error("frame needs {0} fragments, maximum is {}", MAX_FRAGMENTS_PER_FRAME)]
    TooManyFragments(usize),

    #[error("frame of {0} bytes does not fit a u32 length")]
    FrameTooLarge(usize),
}

/// Send or receive failure on the video channel. Never fatal: the owning
/// loop logs it and moves on to the next frame.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("frame {frame_id} cannot be fragmented: {source}")]
    Fragment {
        frame_id: u32,
        #[source]
        source: FragmentError,
    },

    #[error("metadata for frame {frame_id} failed to send: {source}")]
    Metadata {
        frame_id: u32,
        #[source]
        source: io::Error,
    },

    #[error("fragment {index} of frame {frame_id} failed to send: {source}")]
    FragmentSend {
        frame_id: u32,
        index: usize,
        #[source]
        source: io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
}
