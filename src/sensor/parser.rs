//! Sensor frame parser.
//!
//! The sensing device sends plain text, one frame per delivered chunk:
//! three decimal integers separated by commas, optionally surrounded by
//! whitespace (`"123,45,-6"`). The field order on the wire is
//! bottom-left, top-left, top-right.
//!
//! Parsing is best effort. Every chunk is appended to an accumulation buffer and
//! an extraction attempt is made immediately; the buffer is cleared after every
//! attempt whether or not a frame came out of it. A frame split across two reads
//! is therefore lost rather than stitched back together.

use thiserror::Error;
use tracing::trace;

/// One parsed triple of channel readings, in device units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorFrame {
    /// Bottom-left channel
    pub bottom_left: i32,
    /// Top-left channel
    pub top_left: i32,
    /// Top-right channel
    pub top_right: i32,
}

impl SensorFrame {
    /// Build a frame from its three channels.
    pub const fn new(bottom_left: i32, top_left: i32, top_right: i32) -> Self {
        Self {
            bottom_left,
            top_left,
            top_right,
        }
    }
}

/// Why a buffer segment did not yield a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameParseError {
    /// The segment did not split into exactly three fields.
    #[error("expected 3 comma-separated fields, found {0}")]
    FieldCount(usize),

    /// One of the fields is not a decimal integer.
    #[error("field {index} is not an integer: {value:?}")]
    InvalidField {
        /// Zero-based position of the offending field
        index: usize,
        /// The field text as received
        value: String,
    },
}

/// Parse one text segment into a [`SensorFrame`].
///
/// Surrounding whitespace is ignored for the segment and for each field.
pub fn parse_frame(text: &str) -> Result<SensorFrame, FrameParseError> {
    let fields: Vec<&str> = text.trim().split(',').collect();
    if fields.len() != 3 {
        return Err(FrameParseError::FieldCount(fields.len()));
    }

    let mut values = [0i32; 3];
    for (index, field) in fields.iter().enumerate() {
        values[index] = field
            .trim()
            .parse()
            .map_err(|_| FrameParseError::InvalidField {
                index,
                value: (*field).to_string(),
            })?;
    }

    Ok(SensorFrame::new(values[0], values[1], values[2]))
}

/// Incremental parser fed with raw chunks from the sensing serial port.
///
/// State is owned by the instance, so independent parsers never share buffers.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    frames: u64,
    rejected: u64,
}

impl FrameParser {
    /// Create a parser with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and attempt extraction.
    ///
    /// Returns the frame if the accumulated segment held exactly one valid frame.
    /// The buffer is always empty when this returns.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<SensorFrame> {
        self.buffer.extend_from_slice(chunk);
        let result = parse_frame(&String::from_utf8_lossy(&self.buffer));
        self.buffer.clear();

        match result {
            Ok(frame) => {
                self.frames += 1;
                Some(frame)
            }
            Err(err) => {
                self.rejected += 1;
                trace!(error = %err, "dropping sensor segment");
                None
            }
        }
    }

    /// Number of frames successfully extracted so far.
    pub fn frames_parsed(&self) -> u64 {
        self.frames
    }

    /// Number of segments dropped as malformed.
    pub fn segments_rejected(&self) -> u64 {
        self.rejected
    }
}
