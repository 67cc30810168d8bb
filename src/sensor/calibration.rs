//! Zero calibration.
//!
//! Offsets are cumulative: `zero()` adds the currently displayed (already
//! calibrated) value of each channel to that channel's offset, so zeroing again
//! after the readings drift moves the baseline further. Nothing here survives a
//! restart.

use super::parser::SensorFrame;
use tracing::debug;

/// Per-channel zero offsets subtracted from raw readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationOffsets {
    /// Top-left offset
    pub top_left: i32,
    /// Top-right offset
    pub top_right: i32,
    /// Bottom-left offset
    pub bottom_left: i32,
}

/// Holds the session's calibration offsets.
#[derive(Debug, Default)]
pub struct CalibrationStore {
    offsets: CalibrationOffsets,
}

impl CalibrationStore {
    /// All offsets start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offsets.
    pub fn offsets(&self) -> CalibrationOffsets {
        self.offsets
    }

    /// Fold the currently displayed calibrated values into the offsets.
    pub fn zero(&mut self, displayed: SensorFrame) {
        self.offsets.top_left = self.offsets.top_left.wrapping_add(displayed.top_left);
        self.offsets.top_right = self.offsets.top_right.wrapping_add(displayed.top_right);
        self.offsets.bottom_left = self
            .offsets
            .bottom_left
            .wrapping_add(displayed.bottom_left);
        debug!(offsets = ?self.offsets, "calibration zeroed");
    }

    /// Drop all offsets.
    pub fn reset(&mut self) {
        self.offsets = CalibrationOffsets::default();
    }

    /// Raw minus offset, per channel.
    pub fn apply(&self, raw: SensorFrame) -> SensorFrame {
        SensorFrame {
            bottom_left: raw.bottom_left.wrapping_sub(self.offsets.bottom_left),
            top_left: raw.top_left.wrapping_sub(self.offsets.top_left),
            top_right: raw.top_right.wrapping_sub(self.offsets.top_right),
        }
    }
}
