//! camlink wire format: the datagrams that carry one frame across the
//! video channel.
//!
//! A frame travels as one metadata datagram followed by N fragment
//! datagrams. Metadata is a small JSON object so that existing consumers of
//! the camera stream keep working; fragments carry a fixed 6-byte big-endian
//! header so the receiver can demultiplex them without trusting arrival order.
//!
//! ```text
//! metadata:  {"frame_id":17,"num_chunks":36,"total_size":50000}
//! fragment:  +--------------+-------------------+-----------------+
//!            | frame_id u32 | fragment_index u16|  payload bytes  |
//!            +--------------+-------------------+-----------------+
//! ```
//!
//! The two datagram kinds are told apart by their first byte: metadata always
//! starts with `{`, and a fragment never does because frame ids stay below
//! `FRAME_ID_CEILING`.

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

// ── Fragment Header ───────────────────────────────────────────────────────────

/// Prefix of every fragment datagram.
///
/// Wire size: 6 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct FragmentHeader {
    frame_id: U32<BigEndian>,
    fragment_index: U16<BigEndian>,
}

assert_eq_size!(FragmentHeader, [u8; 6]);

impl FragmentHeader {
    pub fn new(frame_id: u32, fragment_index: u16) -> Self {
        Self {
            frame_id: U32::new(frame_id),
            fragment_index: U16::new(fragment_index),
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id.get()
    }

    pub fn fragment_index(&self) -> u16 {
        self.fragment_index.get()
    }
}

/// Build a complete fragment datagram: header followed by payload.
pub fn encode_fragment(frame_id: u32, fragment_index: u16, payload: &[u8]) -> Vec<u8> {
    let header = FragmentHeader::new(frame_id, fragment_index);
    let mut datagram = Vec::with_capacity(FRAGMENT_HEADER_SIZE + payload.len());
    datagram.extend_from_slice(header.as_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

// ── Frame Metadata ────────────────────────────────────────────────────────────

/// Announces a frame before its fragments.
///
/// Field names match what camera producers already put on the wire, so
/// `fragment_count` is serialized as `num_chunks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub frame_id: u32,
    #[serde(rename = "num_chunks")]
    pub fragment_count: u32,
    /// Total frame length in bytes. Older producers omit it; when present the
    /// receiver checks the reassembled length against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u32>,
}

impl FrameMetadata {
    pub fn encode(&self) -> Vec<u8> {
        // A struct of three integers always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let meta: FrameMetadata = serde_json::from_slice(bytes)
            .map_err(|e| WireError::MalformedMetadata(e.to_string()))?;
        if meta.frame_id >= FRAME_ID_CEILING {
            return Err(WireError::FrameIdOutOfRange(meta.frame_id));
        }
        if meta.fragment_count as usize > MAX_FRAGMENTS_PER_FRAME {
            return Err(WireError::TooManyFragments(meta.fragment_count as usize));
        }
        Ok(meta)
    }
}

// ── Datagram demultiplexing ───────────────────────────────────────────────────

/// One received datagram on the video channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram<'a> {
    Metadata(FrameMetadata),
    Fragment {
        header: FragmentHeader,
        payload: &'a [u8],
    },
}

impl<'a> Datagram<'a> {
    pub fn decode(buf: &'a [u8]) -> Result<Self, WireError> {
        match buf.first() {
            None => Err(WireError::Truncated(0)),
            Some(b'{') => FrameMetadata::decode(buf).map(Datagram::Metadata),
            Some(_) => {
                let header = FragmentHeader::read_from_prefix(buf)
                    .ok_or(WireError::Truncated(buf.len()))?;
                Ok(Datagram::Fragment {
                    header,
                    payload: &buf[FRAGMENT_HEADER_SIZE..],
                })
            }
        }
    }
}

/// Number of fragments needed to carry `total_len` bytes.
pub fn fragment_count(total_len: usize, max_fragment_size: usize) -> usize {
    if max_fragment_size == 0 {
        return 0;
    }
    total_len.div_ceil(max_fragment_size)
}

// ── Frame ids ─────────────────────────────────────────────────────────────────

/// Wrapping frame id generator. Ids cycle through `0..modulus`.
#[derive(Debug, Clone)]
pub struct FrameIdCounter {
    next: u32,
    modulus: u32,
}

impl FrameIdCounter {
    /// `modulus` is clamped into `1..=FRAME_ID_CEILING`.
    pub fn new(modulus: u32) -> Self {
        Self {
            next: 0,
            modulus: modulus.clamp(1, FRAME_ID_CEILING),
        }
    }

    /// Return the current id and advance.
    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = (self.next + 1) % self.modulus;
        id
    }

    pub fn modulus(&self) -> u32 {
        self.modulus
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Size of the fixed fragment header.
pub const FRAGMENT_HEADER_SIZE: usize = std::mem::size_of::<FragmentHeader>();

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65507;

/// Largest fragment payload that still fits a single datagram.
pub const MAX_FRAGMENT_PAYLOAD: usize = MAX_DATAGRAM_PAYLOAD - FRAGMENT_HEADER_SIZE;

/// Default fragment payload size, chosen to stay under common path MTU.
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 1400;

/// Default frame id cycle.
pub const DEFAULT_FRAME_ID_MODULUS: u32 = 10_000;

/// Frame ids must stay below this so a fragment's first byte is never `{`.
pub const FRAME_ID_CEILING: u32 = 0x7B00_0000;

/// The fragment index is a u16, so a frame can span at most this many fragments.
pub const MAX_FRAGMENTS_PER_FRAME: usize = u16::MAX as usize + 1;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting video-channel datagrams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("datagram of {0} bytes is too short")]
    Truncated(usize),

    #[error("malformed frame metadata: {0}")]
    MalformedMetadata(String),

    #[error("frame id {0} is outside the allowed range")]
    FrameIdOutOfRange(u32),

    #[error("frame needs {0} fragments, maximum is {}", MAX_FRAGMENTS_PER_FRAME)]
    TooManyFragments(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
