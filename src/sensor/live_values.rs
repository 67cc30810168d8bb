//! Latest reading of each channel, shared by the display and the capture engine.

use super::calibration::CalibrationStore;
use super::parser::SensorFrame;

/// A calibrated reading together with the raw values it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reading {
    /// Raw minus zero offset
    pub calibrated: SensorFrame,
    /// As received from the device
    pub raw: SensorFrame,
}

/// Most recent raw frame. Updated all-or-nothing.
#[derive(Debug, Default)]
pub struct LiveValueCache {
    raw: SensorFrame,
    updates: u64,
}

impl LiveValueCache {
    /// Empty cache; all channels read zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all three channels.
    pub fn update(&mut self, frame: SensorFrame) {
        self.raw = frame;
        self.updates += 1;
    }

    /// Zero all channels.
    pub fn clear(&mut self) {
        self.raw = SensorFrame::default();
    }

    /// Raw values of the last frame.
    pub fn raw(&self) -> SensorFrame {
        self.raw
    }

    /// Calibrated values of the last frame.
    pub fn calibrated(&self, calibration: &CalibrationStore) -> SensorFrame {
        calibration.apply(self.raw)
    }

    /// Calibrated and raw values at once, as needed for a CSV row.
    pub fn reading(&self, calibration: &CalibrationStore) -> Reading {
        Reading {
            calibrated: self.calibrated(calibration),
            raw: self.raw,
        }
    }

    /// How many frames have been applied since startup.
    pub fn update_count(&self) -> u64 {
        self.updates
    }
}
