//! Plain-text rendering for the console front end.

use crate::capture::{CaptureState, Progress};
use crate::sensor::Reading;

/// Width of the progress bar in characters, brackets excluded.
pub const PROGRESS_BAR_WIDTH: usize = 30;

/// Calibrated values in the channel order shown on the rig.
pub fn render_reading(reading: &Reading) -> String {
    let c = reading.calibrated;
    format!(
        "Top Left: {:>6}  Top Right: {:>6}  Bottom Left: {:>6}",
        c.top_left, c.top_right, c.bottom_left
    )
}

/// `[#######-----------] 7/20 (35%)`
pub fn render_progress(progress: Progress, width: usize) -> String {
    let fraction = progress.fraction().clamp(0.0, 1.0);
    let filled = ((fraction * width as f64).round() as usize).min(width);
    format!(
        "[{}{}] {}/{} ({:.0}%)",
        "#".repeat(filled),
        "-".repeat(width - filled),
        progress.frames_captured,
        progress.total_frames,
        fraction * 100.0
    )
}

/// Snapshot of the shell for the `status` command.
#[derive(Debug, Clone)]
pub struct StatusView<'a> {
    /// Capture state
    pub state: CaptureState,
    /// Capture progress
    pub progress: Progress,
    /// Latest reading
    pub reading: Reading,
    /// Name of the open sensor link
    pub sensor: Option<&'a str>,
    /// Whether a trigger peripheral is attached
    pub trigger_connected: bool,
}

/// Multi-line status block.
pub fn render_status(view: &StatusView<'_>) -> String {
    let trigger = if view.trigger_connected {
        "connected"
    } else {
        "not connected"
    };
    format!(
        "sensor:  {}\ntrigger: {}\ncapture: {} {}\nvalues:  {}",
        view.sensor.unwrap_or("not connected"),
        trigger,
        view.state,
        render_progress(view.progress, PROGRESS_BAR_WIDTH),
        render_reading(&view.reading)
    )
}
