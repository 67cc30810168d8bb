//! Frame count and tick interval derived from a requested rate and duration.

use crate::error::{AppResult, RigError};
use crate::validation::is_positive_finite;
use std::time::Duration;

/// Longest tick interval the scheduler will use, in milliseconds.
pub const MAX_TICK_INTERVAL_MS: u64 = u32::MAX as u64;

/// Number of frames a capture produces: `round(fps × duration)`, half away from zero.
pub fn total_frames(frames_per_second: f64, duration_seconds: f64) -> u64 {
    // `as` saturates, so absurd products clamp instead of wrapping.
    (frames_per_second * duration_seconds).round() as u64
}

/// Tick interval in milliseconds: `max(1, round(1000 / fps))`.
pub fn tick_interval_ms(frames_per_second: f64) -> u64 {
    ((1000.0 / frames_per_second).round() as u64).clamp(1, MAX_TICK_INTERVAL_MS)
}

/// Validated parameters of one capture session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePlan {
    frames_per_second: f64,
    duration_seconds: f64,
    total_frames: u64,
    interval_ms: u64,
}

impl CapturePlan {
    /// Validate the request and derive frame count and interval.
    ///
    /// # Errors
    ///
    /// `RigError::Validation` if either value is zero, negative, NaN or infinite.
    pub fn new(frames_per_second: f64, duration_seconds: f64) -> AppResult<Self> {
        is_positive_finite(frames_per_second, "frames per second").map_err(RigError::Validation)?;
        is_positive_finite(duration_seconds, "capture length").map_err(RigError::Validation)?;

        Ok(Self {
            frames_per_second,
            duration_seconds,
            total_frames: total_frames(frames_per_second, duration_seconds),
            interval_ms: tick_interval_ms(frames_per_second),
        })
    }

    /// Requested frame rate.
    pub fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    /// Requested capture length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Frames the session will capture.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Tick interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
