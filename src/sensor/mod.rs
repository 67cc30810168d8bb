//! Sensor side of the rig: frame parsing, zero calibration and the live value cache.
//!
//! ```text
//! raw bytes → FrameParser → LiveValueCache ─┐
//!                                           ├→ Reading { calibrated, raw }
//!                    CalibrationStore ──────┘
//! ```

pub mod calibration;
pub mod live_values;
pub mod parser;

pub use calibration::{CalibrationOffsets, CalibrationStore};
pub use live_values::{LiveValueCache, Reading};
pub use parser::{parse_frame, FrameParseError, FrameParser, SensorFrame};
