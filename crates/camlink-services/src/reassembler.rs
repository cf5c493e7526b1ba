//! Frame reassembly state machine.
//!
//! At most one frame is in flight at a time. Metadata opens a slot sized to
//! the announced fragment count; a newer frame's metadata evicts whatever is
//! still incomplete, because a late video frame is worth nothing. Fragments
//! that do not belong to the open slot are dropped, duplicates are ignored,
//! and a slot that misses its deadline is discarded without emitting a frame.
//!
//! The reassembler does no I/O and reads no clock of its own. Callers pass
//! `now` into every operation, which keeps timeout behavior deterministic
//! under test.

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use camlink_core::config::StreamConfig;
use camlink_core::wire::{Datagram, FragmentHeader, FrameMetadata, WireError};

/// Default time an incomplete frame may wait for its fragments.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(100);

/// Default ceiling on buffered bytes for one frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct ReassemblerConfig {
    /// Deadline measured from metadata arrival.
    pub timeout: Duration,
    pub max_frame_bytes: usize,
}

impl ReassemblerConfig {
    pub fn from_stream(stream: &StreamConfig) -> Self {
        Self {
            timeout: stream.reassembly_timeout(),
            max_frame_bytes: stream.max_frame_bytes,
        }
    }
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// A frame whose every fragment arrived, concatenated in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFrame {
    pub frame_id: u32,
    pub data: Bytes,
    pub fragment_count: usize,
    /// Time from metadata arrival to the last fragment.
    pub assembly_time: Duration,
}

/// Running counters, read by the status printer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    pub metadata_received: u64,
    pub fragments_received: u64,
    pub frames_completed: u64,
    pub duplicates: u64,
    /// Fragments for a frame id that has no open slot.
    pub stale_dropped: u64,
    /// Incomplete frames replaced by newer metadata.
    pub evicted: u64,
    pub timed_out: u64,
    /// Frames abandoned because they broke a size limit.
    pub rejected: u64,
    pub malformed: u64,
}

struct Slot {
    frame_id: u32,
    fragments: Vec<Option<Vec<u8>>>,
    filled: usize,
    buffered_bytes: usize,
    expected_size: Option<u32>,
    opened_at: Instant,
    deadline: Instant,
}

impl Slot {
    fn open(meta: &FrameMetadata, now: Instant, timeout: Duration) -> Self {
        Self {
            frame_id: meta.frame_id,
            fragments: vec![None; meta.fragment_count as usize],
            filled: 0,
            buffered_bytes: 0,
            expected_size: meta.total_size,
            opened_at: now,
            deadline: now + timeout,
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.fragments.len()
    }

    fn assemble(self, now: Instant) -> CompletedFrame {
        let mut data = BytesMut::with_capacity(self.buffered_bytes);
        let fragment_count = self.fragments.len();
        for payload in self.fragments.into_iter().flatten() {
            data.extend_from_slice(&payload);
        }
        CompletedFrame {
            frame_id: self.frame_id,
            data: data.freeze(),
            fragment_count,
            assembly_time: now.saturating_duration_since(self.opened_at),
        }
    }
}

pub struct Reassembler {
    config: ReassemblerConfig,
    active: Option<Slot>,
    stats: ReassemblerStats,
}

impl Reassembler {
    pub fn new(config: ReassemblerConfig) -> Self {
        Self {
            config,
            active: None,
            stats: ReassemblerStats::default(),
        }
    }

    /// Open a slot for `meta`. Returns the id of an incomplete frame that was
    /// evicted to make room, if any.
    ///
    /// Repeated metadata for the frame already open is ignored so a
    /// re-announced frame keeps the fragments it already has.
    pub fn on_metadata(&mut self, meta: FrameMetadata, now: Instant) -> Option<u32> {
        self.stats.metadata_received += 1;
        self.expire(now);

        if meta.fragment_count == 0 {
            self.stats.malformed += 1;
            tracing::debug!(frame_id = meta.frame_id, "metadata announces zero fragments");
            return None;
        }
        if let Some(total) = meta.total_size {
            if total as usize > self.config.max_frame_bytes {
                self.stats.rejected += 1;
                tracing::debug!(
                    frame_id = meta.frame_id,
                    total,
                    limit = self.config.max_frame_bytes,
                    "announced frame exceeds size limit"
                );
                return None;
            }
        }

        if self
            .active
            .as_ref()
            .is_some_and(|slot| slot.frame_id == meta.frame_id)
        {
            return None;
        }

        let evicted = self.active.take().map(|slot| {
            self.stats.evicted += 1;
            tracing::trace!(
                frame_id = slot.frame_id,
                filled = slot.filled,
                expected = slot.fragments.len(),
                "incomplete frame evicted by newer metadata"
            );
            slot.frame_id
        });

        self.active = Some(Slot::open(&meta, now, self.config.timeout));
        evicted
    }

    /// Store one fragment. Returns the finished frame once the last missing
    /// index arrives.
    ///
    /// Fragments for unknown frames, out-of-range indices, and duplicates are
    /// absorbed without error. An error means the open frame broke a size
    /// limit and was discarded.
    pub fn on_fragment(
        &mut self,
        header: FragmentHeader,
        payload: &[u8],
        now: Instant,
    ) -> Result<Option<CompletedFrame>, ReassemblyError> {
        self.stats.fragments_received += 1;
        self.expire(now);

        let frame_id = header.frame_id();
        let index = header.fragment_index() as usize;

        let Some(slot) = self.active.as_mut().filter(|s| s.frame_id == frame_id) else {
            self.stats.stale_dropped += 1;
            return Ok(None);
        };

        let Some(entry) = slot.fragments.get_mut(index) else {
            self.stats.malformed += 1;
            tracing::trace!(frame_id, index, "fragment index out of range");
            return Ok(None);
        };
        if entry.is_some() {
            self.stats.duplicates += 1;
            return Ok(None);
        }

        let buffered = slot.buffered_bytes + payload.len();
        if buffered > self.config.max_frame_bytes {
            self.active = None;
            self.stats.rejected += 1;
            return Err(ReassemblyError::FrameTooLarge {
                frame_id,
                limit: self.config.max_frame_bytes,
            });
        }

        *entry = Some(payload.to_vec());
        slot.filled += 1;
        slot.buffered_bytes = buffered;

        if !slot.is_complete() {
            return Ok(None);
        }

        let Some(slot) = self.active.take() else {
            return Ok(None);
        };
        if let Some(expected) = slot.expected_size {
            if slot.buffered_bytes != expected as usize {
                self.stats.rejected += 1;
                return Err(ReassemblyError::SizeMismatch {
                    frame_id,
                    expected: expected as usize,
                    actual: slot.buffered_bytes,
                });
            }
        }

        self.stats.frames_completed += 1;
        Ok(Some(slot.assemble(now)))
    }

    /// Decode a raw datagram and route it to `on_metadata` or `on_fragment`.
    pub fn on_datagram(
        &mut self,
        buf: &[u8],
        now: Instant,
    ) -> Result<Option<CompletedFrame>, ReassemblyError> {
        match Datagram::decode(buf) {
            Ok(Datagram::Metadata(meta)) => {
                self.on_metadata(meta, now);
                Ok(None)
            }
            Ok(Datagram::Fragment { header, payload }) => self.on_fragment(header, payload, now),
            Err(e) => {
                self.stats.malformed += 1;
                Err(ReassemblyError::Wire(e))
            }
        }
    }

    /// Discard the open slot if its deadline has passed. Returns the id of the
    /// frame that timed out.
    pub fn expire(&mut self, now: Instant) -> Option<u32> {
        let expired = self.active.as_ref().is_some_and(|slot| now >= slot.deadline);
        if !expired {
            return None;
        }
        let slot = self.active.take()?;
        self.stats.timed_out += 1;
        tracing::trace!(
            frame_id = slot.frame_id,
            filled = slot.filled,
            expected = slot.fragments.len(),
            "frame timed out"
        );
        Some(slot.frame_id)
    }

    /// Deadline of the open slot, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|slot| slot.deadline)
    }

    pub fn active_slots(&self) -> usize {
        usize::from(self.active.is_some())
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(ReassemblerConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReassemblyError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("frame {frame_id} reassembled to {actual} bytes, metadata announced {expected}")]
    SizeMismatch {
        frame_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame {frame_id} exceeds the {limit}-byte limit")]
    FrameTooLarge { frame_id: u32, limit: usize },
}
