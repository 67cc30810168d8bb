//! Application shell.
//!
//! [`RigApp`] owns everything the capture core borrows: the two device links,
//! the frame parser, the live value cache, the calibration store and the capture
//! engine. It is driven by a single `tokio::select!` loop in [`RigApp::run`]:
//!
//! ```text
//! sensor reader ──SensorEvent──┐
//! capture ticker ──tick────────┼──> RigApp ──AppEvent (broadcast)──> front end
//! front end ──ControlCommand───┘
//! ```
//!
//! Nothing in the loop blocks and no state is shared, so no locking is needed.
//! The ticker exists only while a session is running; dropping it on stop is
//! what guarantees no tick is processed after cancellation.

pub mod commands;

pub use commands::ControlCommand;

use crate::capture::{CaptureEngine, CaptureState, Progress, TickOutcome};
use crate::config::RigConfig;
use crate::display::{render_status, StatusView};
use crate::error::{AppResult, RigError};
use crate::hardware::{
    available_ports, SensorConnection, SensorEvent, SerialSensor, SerialTrigger, TriggerChannel,
};
use crate::sensor::{CalibrationStore, FrameParser, LiveValueCache, Reading};
use crate::validation::is_valid_port_name;
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the [`AppEvent`] broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notifications for front ends.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A new frame was applied to the live values
    Reading(Reading),
    /// A session opened its file and is waiting for its first tick
    CaptureStarted {
        /// CSV file of the session
        path: PathBuf,
        /// Frames the session will capture
        total_frames: u64,
    },
    /// A frame was captured
    Progress(Progress),
    /// A session completed or was cancelled
    CaptureFinished {
        /// `Completed` or `Cancelled`
        state: CaptureState,
        /// Frames captured when it ended
        progress: Progress,
    },
    /// The sensor link was opened
    SensorOpened(String),
    /// The sensor link went away, with the reason
    SensorClosed(String),
    /// Text the user asked for (status, port list)
    Notice(String),
    /// A failed request
    Error(String),
}

/// When [`RigApp::run`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Until `quit` or the control channel closes
    Interactive,
    /// As soon as no session is running (or on `quit`)
    UntilCaptureEnds,
}

/// The application shell.
pub struct RigApp {
    config: RigConfig,
    parser: FrameParser,
    cache: LiveValueCache,
    calibration: CalibrationStore,
    engine: CaptureEngine,
    trigger: Box<dyn TriggerChannel>,
    sensor: Option<SensorConnection>,
    ticker: Option<Interval>,
    events: broadcast::Sender<AppEvent>,
}

impl RigApp {
    /// Shell with no open links, writing sessions where `config` says.
    pub fn new(config: RigConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine: CaptureEngine::new(config.output_target()),
            config,
            parser: FrameParser::new(),
            cache: LiveValueCache::new(),
            calibration: CalibrationStore::new(),
            trigger: Box::new(SerialTrigger::disconnected()),
            sensor: None,
            ticker: None,
            events,
        }
    }

    /// Receive [`AppEvent`]s from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Configuration the shell was built with.
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// The capture engine.
    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    /// Calibration offsets in effect.
    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    /// Latest calibrated and raw values.
    pub fn reading(&self) -> Reading {
        self.cache.reading(&self.calibration)
    }

    /// Progress of the current session.
    pub fn progress(&self) -> Progress {
        self.engine.progress()
    }

    /// State of the current session.
    pub fn capture_state(&self) -> CaptureState {
        self.engine.state()
    }

    /// Name of the open sensor link.
    pub fn sensor_name(&self) -> Option<&str> {
        self.sensor.as_ref().map(SensorConnection::name)
    }

    /// Whether a trigger peripheral is attached.
    pub fn trigger_connected(&self) -> bool {
        self.trigger.is_connected()
    }

    // ---------------------------------------------------------------------
    // Capture control
    // ---------------------------------------------------------------------

    /// Start a session and schedule its ticks.
    ///
    /// A running session is cancelled first. On a validation error nothing
    /// changes; if the file cannot be created the shell is left without a
    /// session.
    pub fn start_capture(&mut self, frames_per_second: f64, duration_seconds: f64) -> AppResult<()> {
        let previous = self.engine.is_running().then(|| self.engine.progress());

        let result = self.engine.start(frames_per_second, duration_seconds);
        if !self.engine.is_running() {
            self.ticker = None;
        }
        if let Some(progress) = previous.filter(|_| !matches!(result, Err(RigError::Validation(_)))) {
            self.emit(AppEvent::CaptureFinished {
                state: CaptureState::Cancelled,
                progress,
            });
        }
        result?;

        self.ticker = self.engine.tick_interval().map(capture_ticker);
        if let Some(session) = self.engine.session() {
            self.emit(AppEvent::CaptureStarted {
                path: session.path().to_path_buf(),
                total_frames: session.plan().total_frames(),
            });
        }
        Ok(())
    }

    /// Cancel the running session. Returns whether there was one.
    pub fn stop_capture(&mut self) -> bool {
        self.ticker = None;
        let stopped = self.engine.stop();
        if stopped {
            self.emit(AppEvent::CaptureFinished {
                state: self.engine.state(),
                progress: self.engine.progress(),
            });
        }
        stopped
    }

    /// Take the currently displayed values as the new zero.
    pub fn zero_calibration(&mut self) {
        let displayed = self.cache.calibrated(&self.calibration);
        self.calibration.zero(displayed);
        info!(offsets = ?self.calibration.offsets(), "calibration zeroed");
        self.emit(AppEvent::Reading(self.reading()));
    }

    /// Process one capture tick against the current live values.
    pub fn on_tick(&mut self) {
        let reading = self.cache.reading(&self.calibration);
        match self.engine.on_tick(reading, self.trigger.as_mut()) {
            TickOutcome::Inactive => self.ticker = None,
            TickOutcome::Captured(progress) => self.emit(AppEvent::Progress(progress)),
            TickOutcome::Completed(progress) => {
                self.ticker = None;
                self.emit(AppEvent::Progress(progress));
                self.emit(AppEvent::CaptureFinished {
                    state: CaptureState::Completed,
                    progress,
                });
            }
            TickOutcome::Failed(e) => {
                self.ticker = None;
                self.emit(AppEvent::Error(e.to_string()));
                self.emit(AppEvent::CaptureFinished {
                    state: CaptureState::Cancelled,
                    progress: self.engine.progress(),
                });
            }
        }
    }

    // ---------------------------------------------------------------------
    // Sensor input
    // ---------------------------------------------------------------------

    /// Feed one delivered chunk to the parser; a complete frame replaces the live values.
    pub fn on_sensor_bytes(&mut self, bytes: &[u8]) {
        if let Some(frame) = self.parser.feed(bytes) {
            self.cache.update(frame);
            self.emit(AppEvent::Reading(self.reading()));
        }
    }

    /// Handle an event from the sensor link; `None` means the producer is gone.
    pub fn on_sensor_event(&mut self, event: Option<SensorEvent>) {
        match event {
            Some(SensorEvent::Chunk(bytes)) => self.on_sensor_bytes(&bytes),
            Some(SensorEvent::Disconnected(reason)) => self.drop_sensor(reason),
            None => self.drop_sensor("sensor stream ended".to_string()),
        }
    }

    fn drop_sensor(&mut self, reason: String) {
        if let Some(sensor) = self.sensor.take() {
            warn!(port = sensor.name(), reason = %reason, "sensor link lost");
            sensor.close();
            self.emit(AppEvent::SensorClosed(reason));
        }
    }

    // ---------------------------------------------------------------------
    // Links
    // ---------------------------------------------------------------------

    /// Open the sensing device on `port_name`, replacing any open link.
    ///
    /// Calibration and live values are reset even if the port fails to open.
    pub fn open_sensor(&mut self, port_name: &str) -> AppResult<()> {
        is_valid_port_name(port_name).map_err(|e| RigError::Serial(e.to_string()))?;
        self.reset_values();
        self.close_sensor();
        let connection = SerialSensor::open(&self.config.sensor_settings(port_name))?;
        self.attach_sensor(connection);
        Ok(())
    }

    /// Use an already open sensor link, replacing any open one.
    pub fn attach_sensor(&mut self, connection: SensorConnection) {
        self.close_sensor();
        self.reset_values();
        info!(port = connection.name(), "sensor link open");
        self.emit(AppEvent::SensorOpened(connection.name().to_string()));
        self.sensor = Some(connection);
    }

    /// Open the trigger peripheral on `port_name`, replacing any open one.
    pub fn open_trigger(&mut self, port_name: &str) -> AppResult<()> {
        is_valid_port_name(port_name).map_err(|e| RigError::Serial(e.to_string()))?;
        self.trigger = Box::new(SerialTrigger::disconnected());
        let trigger = SerialTrigger::open(&self.config.trigger_settings(port_name))?;
        info!(port = port_name, "trigger link open");
        self.set_trigger(Box::new(trigger));
        Ok(())
    }

    /// Use the given trigger channel from the next tick on.
    pub fn set_trigger(&mut self, trigger: Box<dyn TriggerChannel>) {
        self.trigger = trigger;
    }

    /// Close both links and reset calibration and live values.
    ///
    /// A running session keeps running; its frames carry the last values and no
    /// trigger is sent.
    pub fn close_ports(&mut self) {
        self.close_sensor();
        self.trigger = Box::new(SerialTrigger::disconnected());
        self.reset_values();
        info!("ports closed");
    }

    fn close_sensor(&mut self) {
        if let Some(sensor) = self.sensor.take() {
            debug!(port = sensor.name(), "closing sensor link");
            sensor.close();
            self.emit(AppEvent::SensorClosed("closed".to_string()));
        }
    }

    fn reset_values(&mut self) {
        self.calibration.reset();
        self.cache.clear();
    }

    /// Stop any recording, then close both links.
    pub fn shutdown(&mut self) {
        self.stop_capture();
        self.close_ports();
    }

    // ---------------------------------------------------------------------
    // Event loop
    // ---------------------------------------------------------------------

    /// Execute a control command. Returns `false` for `quit`.
    ///
    /// Failures are logged and reported as [`AppEvent::Error`].
    pub fn handle_command(&mut self, command: ControlCommand) -> bool {
        debug!(?command, "control command");
        let result = match command {
            ControlCommand::OpenSensor(port) => self.open_sensor(&port),
            ControlCommand::OpenTrigger(port) => self.open_trigger(&port),
            ControlCommand::ClosePorts => {
                self.close_ports();
                Ok(())
            }
            ControlCommand::Start {
                frames_per_second,
                duration_seconds,
            } => self.start_capture(frames_per_second, duration_seconds),
            ControlCommand::Stop => {
                if !self.stop_capture() {
                    self.emit(AppEvent::Notice("no capture running".to_string()));
                }
                Ok(())
            }
            ControlCommand::Zero => {
                self.zero_calibration();
                Ok(())
            }
            ControlCommand::Status => {
                let status = self.status_text();
                self.emit(AppEvent::Notice(status));
                Ok(())
            }
            ControlCommand::ListPorts => available_ports().map(|ports| {
                let text = if ports.is_empty() {
                    "no serial ports found".to_string()
                } else {
                    ports.join("\n")
                };
                self.emit(AppEvent::Notice(text));
            }),
            ControlCommand::Quit => return false,
        };

        if let Err(e) = result {
            warn!(error = %e, "command failed");
            if e.is_user_visible() {
                self.emit(AppEvent::Error(e.to_string()));
            }
        }
        true
    }

    /// Links, capture progress and values as text.
    pub fn status_text(&self) -> String {
        render_status(&StatusView {
            state: self.engine.state(),
            progress: self.engine.progress(),
            reading: self.reading(),
            sensor: self.sensor_name(),
            trigger_connected: self.trigger.is_connected(),
        })
    }

    /// Dispatch sensor events, capture ticks and control commands until `mode`
    /// says to stop, then stop recording and close both links.
    pub async fn run(&mut self, mut control: mpsc::Receiver<ControlCommand>, mode: RunMode) {
        info!(?mode, "event loop started");
        let mut control_open = true;

        loop {
            if mode == RunMode::UntilCaptureEnds && !self.engine.is_running() {
                break;
            }

            tokio::select! {
                event = next_sensor_event(&mut self.sensor) => self.on_sensor_event(event),
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                command = control.recv(), if control_open => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        control_open = false;
                        if mode == RunMode::Interactive {
                            break;
                        }
                    }
                },
            }
        }

        self.shutdown();
        info!("event loop stopped");
    }

    fn emit(&self, event: AppEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn capture_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_sensor_event(sensor: &mut Option<SensorConnection>) -> Option<SensorEvent> {
    match sensor {
        Some(sensor) => sensor.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::csv_sink::FullDisk;
    use crate::hardware::mock::{ManualSensor, MockTrigger};
    use crate::sensor::SensorFrame;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn app() -> (TempDir, RigApp) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RigConfig::default();
        config.capture.output_dir = Some(dir.path().to_path_buf());
        (dir, RigApp::new(config))
    }

    #[test]
    fn frames_update_live_values() {
        let (_dir, mut app) = app();
        let mut events = app.subscribe();

        app.on_sensor_bytes(b"30,50,40\n");
        assert_eq!(app.reading().raw, SensorFrame::new(30, 50, 40));
        assert!(matches!(events.try_recv(), Ok(AppEvent::Reading(_))));

        // Malformed input leaves the values alone.
        app.on_sensor_bytes(b"30,50");
        assert_eq!(app.reading().raw, SensorFrame::new(30, 50, 40));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn zero_then_new_frame() {
        let (_dir, mut app) = app();
        app.on_sensor_bytes(b"30,50,40");
        app.zero_calibration();
        assert_eq!(app.reading().calibrated, SensorFrame::new(0, 0, 0));

        app.on_sensor_bytes(b"30,55,40");
        let reading = app.reading();
        assert_eq!(reading.calibrated.top_left, 5);
        assert_eq!(reading.raw.top_left, 55);
    }

    #[tokio::test]
    async fn attaching_a_sensor_resets_calibration() {
        let (_dir, mut app) = app();
        app.on_sensor_bytes(b"10,10,10");
        app.zero_calibration();

        let (_tx, conn) = ManualSensor::connect("rig");
        app.attach_sensor(conn);
        assert_eq!(app.sensor_name(), Some("rig"));
        assert_eq!(app.reading(), Reading::default());
        assert_eq!(app.calibration().offsets(), Default::default());

        app.close_ports();
        assert_eq!(app.sensor_name(), None);
        assert!(!app.trigger_connected());
    }

    #[tokio::test]
    async fn sensor_disconnect_drops_the_link() {
        let (_dir, mut app) = app();
        let (_tx, conn) = ManualSensor::connect("rig");
        app.attach_sensor(conn);
        let mut events = app.subscribe();

        app.on_sensor_event(Some(SensorEvent::Disconnected("unplugged".into())));
        assert_eq!(app.sensor_name(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            AppEvent::SensorClosed("unplugged".into())
        );
    }

    #[tokio::test]
    async fn invalid_start_keeps_running_session() {
        let (_dir, mut app) = app();
        app.start_capture(10.0, 1.0).unwrap();
        let mut events = app.subscribe();

        let err = app.start_capture(0.0, 1.0).unwrap_err();
        assert!(matches!(err, RigError::Validation(_)));
        assert_eq!(app.capture_state(), CaptureState::Running);
        assert!(app.ticker.is_some());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn restart_reports_cancelled_session() {
        let (_dir, mut app) = app();
        app.set_trigger(Box::new(MockTrigger::new()));
        app.start_capture(10.0, 1.0).unwrap();
        app.on_tick();
        let mut events = app.subscribe();

        app.start_capture(5.0, 1.0).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            AppEvent::CaptureFinished {
                state: CaptureState::Cancelled,
                progress: Progress {
                    frames_captured: 1,
                    total_frames: 10
                }
            }
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::CaptureStarted { total_frames: 5, .. }
        ));
    }

    #[tokio::test]
    async fn stop_drops_the_ticker() {
        let (_dir, mut app) = app();
        app.start_capture(2.0, 1.0).unwrap();
        assert!(app.ticker.is_some());
        assert!(app.stop_capture());
        assert!(app.ticker.is_none());
        assert_eq!(app.capture_state(), CaptureState::Cancelled);
        assert!(!app.stop_capture());
    }

    #[tokio::test]
    #[traced_test]
    async fn trigger_failures_are_logged_not_reported() {
        let (_dir, mut app) = app();
        let trigger = MockTrigger::new();
        trigger.set_failing(true);
        app.set_trigger(Box::new(trigger.clone()));
        app.start_capture(2.0, 1.0).unwrap();
        let mut events = app.subscribe();

        app.on_tick();
        assert_eq!(trigger.failures(), 1);
        assert!(logs_contain("trigger not delivered"));
        assert!(matches!(events.try_recv(), Ok(AppEvent::Progress(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn csv_write_failure_ends_the_session() {
        let (_dir, mut app) = app();
        let trigger = MockTrigger::new();
        app.set_trigger(Box::new(trigger.clone()));
        app.start_capture(4.0, 1.0).unwrap();
        app.on_tick();
        app.engine.sink_mut().redirect(Box::new(FullDisk));
        let mut events = app.subscribe();

        app.on_tick();
        assert!(app.ticker.is_none());
        assert_eq!(app.capture_state(), CaptureState::Cancelled);
        assert_eq!(trigger.count(), 1);
        assert!(matches!(events.try_recv(), Ok(AppEvent::Error(_))));
        assert_eq!(
            events.try_recv().unwrap(),
            AppEvent::CaptureFinished {
                state: CaptureState::Cancelled,
                progress: Progress {
                    frames_captured: 1,
                    total_frames: 4
                }
            }
        );
    }

    #[test]
    fn commands_report_errors_and_quit() {
        let (_dir, mut app) = app();
        let mut events = app.subscribe();

        assert!(app.handle_command(ControlCommand::Start {
            frames_per_second: -1.0,
            duration_seconds: 1.0
        }));
        assert!(matches!(events.try_recv(), Ok(AppEvent::Error(_))));

        assert!(app.handle_command(ControlCommand::Stop));
        assert_eq!(
            events.try_recv().unwrap(),
            AppEvent::Notice("no capture running".into())
        );

        assert!(app.handle_command(ControlCommand::Status));
        match events.try_recv() {
            Ok(AppEvent::Notice(text)) => assert!(text.contains("capture: idle")),
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(!app.handle_command(ControlCommand::Quit));
    }
}
