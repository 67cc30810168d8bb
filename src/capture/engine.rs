//! Timed capture engine.
//!
//! The engine is a plain state machine. It never sleeps or owns a timer; the
//! event loop calls [`CaptureEngine::on_tick`] every [`CaptureEngine::tick_interval`]
//! while the engine reports [`CaptureState::Running`], and drops its ticker as
//! soon as it does not.
//!
//! ```text
//!   Idle ──start──▶ Armed ──sink open──▶ Running ──N frames──▶ Completed
//!    ▲                │                    │
//!    └── open failed ─┘                    └──stop / restart──▶ Cancelled
//! ```
//!
//! Per tick, in order: frame-count check, CSV row, trigger byte, counter
//! increment. The count check comes first, so a late tick can never produce
//! frame N+1.

use super::plan::CapturePlan;
use crate::data::csv_sink::{session_file_name, CaptureRow, CsvSink};
use crate::error::{AppResult, RigError};
use crate::hardware::TriggerChannel;
use crate::sensor::Reading;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Lifecycle of the current (or most recent) capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No session
    Idle,
    /// Session created, sink open, ticks not yet scheduled
    Armed,
    /// Ticks are being processed
    Running,
    /// All frames captured
    Completed,
    /// Stopped before completion
    Cancelled,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::Idle => "idle",
            CaptureState::Armed => "armed",
            CaptureState::Running => "running",
            CaptureState::Completed => "completed",
            CaptureState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Frames captured out of frames requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Frames written so far
    pub frames_captured: u64,
    /// Frames the session will write
    pub total_frames: u64,
}

impl Progress {
    /// Completion ratio in `0.0..=1.0`. A zero-frame session counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            1.0
        } else {
            self.frames_captured as f64 / self.total_frames as f64
        }
    }
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// No session is running; nothing happened.
    Inactive,
    /// One frame was captured and more remain.
    Captured(Progress),
    /// The session reached its frame count and the sink is closed.
    Completed(Progress),
    /// The row could not be written; the session was cancelled.
    Failed(RigError),
}

/// Where session files go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Directory for new files
    pub dir: PathBuf,
    /// File name prefix, followed by `_<timestamp>.csv`
    pub prefix: String,
}

impl OutputTarget {
    /// Target in `dir` with the given prefix.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Path of a session started at `at`.
    pub fn path_for(&self, at: DateTime<Local>) -> PathBuf {
        self.dir.join(session_file_name(&self.prefix, at))
    }
}

/// One capture run.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    plan: CapturePlan,
    frames_captured: u64,
    state: CaptureState,
    path: PathBuf,
}

impl CaptureSession {
    /// Rate, duration and derived frame count.
    pub fn plan(&self) -> &CapturePlan {
        &self.plan
    }

    /// Current state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// CSV file of this session.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Progress of this session.
    pub fn progress(&self) -> Progress {
        Progress {
            frames_captured: self.frames_captured,
            total_frames: self.plan.total_frames(),
        }
    }
}

/// Drives capture sessions and owns the CSV sink while they run.
pub struct CaptureEngine {
    output: OutputTarget,
    sink: CsvSink,
    session: Option<CaptureSession>,
}

impl CaptureEngine {
    /// Engine writing new sessions to `output`.
    pub fn new(output: OutputTarget) -> Self {
        Self {
            output,
            sink: CsvSink::new(),
            session: None,
        }
    }

    /// Start a session writing to a timestamped file in the output directory.
    ///
    /// See [`CaptureEngine::start_at`].
    pub fn start(&mut self, frames_per_second: f64, duration_seconds: f64) -> AppResult<Progress> {
        let plan = CapturePlan::new(frames_per_second, duration_seconds)?;
        let path = self.output.path_for(Local::now());
        self.begin(plan, path)
    }

    /// Start a session writing to `path`.
    ///
    /// Parameters are validated before anything else happens. A running session
    /// is cancelled and its file closed before the new file is opened. If the
    /// file cannot be created the engine is left idle and the error returned.
    pub fn start_at(
        &mut self,
        frames_per_second: f64,
        duration_seconds: f64,
        path: impl Into<PathBuf>,
    ) -> AppResult<Progress> {
        let plan = CapturePlan::new(frames_per_second, duration_seconds)?;
        self.begin(plan, path.into())
    }

    fn begin(&mut self, plan: CapturePlan, path: PathBuf) -> AppResult<Progress> {
        if self.stop() {
            info!("previous capture cancelled by new start");
        }

        let mut session = CaptureSession {
            plan,
            frames_captured: 0,
            state: CaptureState::Armed,
            path,
        };

        if let Err(e) = self.sink.start(&session.path) {
            error!(error = %e, "capture not started");
            self.session = None;
            return Err(e);
        }

        session.state = CaptureState::Running;
        info!(
            fps = plan.frames_per_second(),
            duration_s = plan.duration_seconds(),
            total_frames = plan.total_frames(),
            interval_ms = plan.interval_ms(),
            path = %session.path.display(),
            "capture started"
        );
        let progress = session.progress();
        self.session = Some(session);
        Ok(progress)
    }

    /// Process one scheduler tick.
    ///
    /// `reading` is whatever the live cache holds right now, however stale.
    /// Trigger failures are logged and otherwise ignored.
    pub fn on_tick(&mut self, reading: Reading, trigger: &mut dyn TriggerChannel) -> TickOutcome {
        let Self { sink, session, .. } = self;
        let Some(session) = session
            .as_mut()
            .filter(|s| s.state == CaptureState::Running)
        else {
            return TickOutcome::Inactive;
        };

        if session.frames_captured >= session.plan.total_frames() {
            finish(sink, session, CaptureState::Completed);
            return TickOutcome::Completed(session.progress());
        }

        if let Err(e) = sink.write_row(&CaptureRow::now(reading)) {
            error!(
                error = %e,
                frames_captured = session.frames_captured,
                "CSV write failed, cancelling capture"
            );
            finish(sink, session, CaptureState::Cancelled);
            return TickOutcome::Failed(e);
        }

        if let Err(e) = trigger.trigger() {
            warn!(error = %e, frame = session.frames_captured + 1, "trigger not delivered");
        }

        session.frames_captured += 1;
        let progress = session.progress();

        if session.frames_captured >= session.plan.total_frames() {
            finish(sink, session, CaptureState::Completed);
            TickOutcome::Completed(progress)
        } else {
            TickOutcome::Captured(progress)
        }
    }

    /// Cancel a running session. Returns whether there was one.
    pub fn stop(&mut self) -> bool {
        let Self { sink, session, .. } = self;
        match session.as_mut() {
            Some(s) if matches!(s.state, CaptureState::Running | CaptureState::Armed) => {
                finish(sink, s, CaptureState::Cancelled);
                true
            }
            _ => {
                sink.stop();
                false
            }
        }
    }

    /// State of the current session, `Idle` if there is none.
    pub fn state(&self) -> CaptureState {
        self.session
            .as_ref()
            .map_or(CaptureState::Idle, CaptureSession::state)
    }

    /// Whether ticks should be scheduled.
    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// Progress of the current session, zero if there is none.
    pub fn progress(&self) -> Progress {
        self.session
            .as_ref()
            .map(CaptureSession::progress)
            .unwrap_or_default()
    }

    /// Tick period while running.
    pub fn tick_interval(&self) -> Option<Duration> {
        self.session
            .as_ref()
            .filter(|s| s.state == CaptureState::Running)
            .map(|s| s.plan.interval())
    }

    /// The current (or most recent) session.
    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Whether the CSV sink is accepting rows.
    pub fn is_recording(&self) -> bool {
        self.sink.is_recording()
    }

    #[cfg(test)]
    pub(crate) fn sink_mut(&mut self) -> &mut CsvSink {
        &mut self.sink
    }
}

fn finish(sink: &mut CsvSink, session: &mut CaptureSession, state: CaptureState) {
    sink.stop();
    session.state = state;
    info!(
        state = %state,
        frames_captured = session.frames_captured,
        total_frames = session.plan.total_frames(),
        "capture ended"
    );
}
