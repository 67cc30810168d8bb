//! Timed capture: turns a frame rate and a duration into a fixed number of
//! recorded, triggered frames.

pub mod engine;
pub mod plan;

pub use engine::{CaptureEngine, CaptureSession, CaptureState, OutputTarget, Progress, TickOutcome};
pub use plan::{tick_interval_ms, total_frames, CapturePlan};
