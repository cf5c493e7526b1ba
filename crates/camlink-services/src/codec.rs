//! Codec seam: where compressed frames come from and how a reassembled
//! buffer is checked before it is shown.
//!
//! Pixel work is out of scope. Sources hand over already-compressed JPEG
//! bytes and the decoder only validates JPEG framing (and reads the frame
//! dimensions when a SOF segment is present).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const COM: u8 = 0xFE;

/// Produces one compressed frame per capture tick.
pub trait FrameSource: Send {
    /// `Ok(None)` means nothing is ready this tick; the loop retries shortly.
    fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError>;
}

/// Checks (and in a full codec, decodes) a reassembled buffer.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DecodedFrame, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub len: usize,
}

// ── Sources ───────────────────────────────────────────────────────────────────

/// Synthetic JPEG-framed frames of a fixed size, each carrying its counter in
/// a comment segment so consecutive frames differ.
pub struct TestPatternSource {
    frame_bytes: usize,
    counter: u64,
}

impl TestPatternSource {
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            frame_bytes,
            counter: 0,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError> {
        let label = format!("camlink test pattern {}", self.counter);
        self.counter += 1;

        // SOI + COM marker + length + label + filler + EOI
        let fixed = SOI.len() + 4 + label.len() + EOI.len();
        let filler = self.frame_bytes.saturating_sub(fixed);

        let mut buf = BytesMut::with_capacity(fixed + filler);
        buf.put_slice(&SOI);
        buf.put_u8(0xFF);
        buf.put_u8(COM);
        buf.put_u16((label.len() + 2) as u16);
        buf.put_slice(label.as_bytes());
        let seed = self.counter as u8;
        buf.extend((0..filler).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed) & 0x7F));
        buf.put_slice(&EOI);
        Ok(Some(buf.freeze()))
    }
}

/// Replays the `.jpg`/`.jpeg` files of a directory in name order, looping.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| SourceError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_jpeg_path(path))
            .collect();
        if files.is_empty() {
            return Err(SourceError::NoFrames(dir.to_path_buf()));
        }
        files.sort();
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError> {
        let path = &self.files[self.next % self.files.len()];
        self.next = (self.next + 1) % self.files.len();
        let data = fs::read(path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Bytes::from(data)))
    }
}

fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

/// Build the source named by the `camera.source` setting.
pub fn source_from_config(
    source: &str,
    test_pattern_bytes: usize,
) -> Result<Box<dyn FrameSource>, SourceError> {
    if source == camlink_core::config::TEST_PATTERN_SOURCE {
        return Ok(Box::new(TestPatternSource::new(test_pattern_bytes)));
    }
    Ok(Box::new(DirectorySource::open(Path::new(source))?))
}

// ── Decoder ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl FrameDecoder for JpegDecoder {
    fn decode(&self, data: &[u8]) -> Result<DecodedFrame, DecodeError> {
        if data.len() < SOI.len() + EOI.len() {
            return Err(DecodeError::Truncated(data.len()));
        }
        if data[..2] != SOI {
            return Err(DecodeError::MissingStartOfImage);
        }
        // Files often carry padding or trailer bytes after EOI.
        if !data[SOI.len()..].windows(EOI.len()).any(|w| w == EOI) {
            return Err(DecodeError::MissingEndOfImage);
        }
        let (width, height) = match frame_dimensions(data) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        Ok(DecodedFrame {
            width,
            height,
            len: data.len(),
        })
    }
}

/// Walk marker segments up to start-of-scan looking for a SOFn header.
fn frame_dimensions(data: &[u8]) -> Option<(u16, u16)> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        match marker {
            // SOF0..SOF15 except DHT (C4), JPG (C8), DAC (CC)
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let body = data.get(pos + 4..pos + 9)?;
                let height = u16::from_be_bytes([body[1], body[2]]);
                let width = u16::from_be_bytes([body[3], body[4]]);
                return Some((width, height));
            }
            0xDA => return None,
            _ => pos += 2 + len,
        }
    }
    None
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no .jpg files in {0}")]
    NoFrames(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("buffer of {0} bytes is too short to be an image")]
    Truncated(usize),

    #[error("missing JPEG start-of-image marker")]
    MissingStartOfImage,

    #[error("missing JPEG end-of-image marker")]
    MissingEndOfImage,
}
