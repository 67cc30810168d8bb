//! Mock Hardware Implementations
//!
//! Simulated devices for running the rig without physical hardware and for tests.
//! All mock devices use async-safe operations (tokio::time, not std::thread::sleep).
//!
//! # Available Mocks
//!
//! - `MockSensor` - Emits text frames at a fixed rate, like the real rig
//! - `ManualSensor` - Lets a test push exact chunks into the event loop
//! - `MockTrigger` - Counts triggers and can be told to fail

use super::{SensorConnection, SensorEvent, SensorSource, SENSOR_CHANNEL_CAPACITY};
use super::trigger::TriggerChannel;
use crate::error::{AppResult, RigError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Duration;

// =============================================================================
// MockSensor - Simulated force rig
// =============================================================================

/// Simulated sensor producing slowly varying readings.
///
/// Frames are sent as `"<bottom_left>,<top_left>,<top_right>\n"`, one per chunk.
pub struct MockSensor {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockSensor {
    /// Start emitting `rate_hz` frames per second. Must be called inside a runtime.
    pub fn spawn(rate_hz: f64) -> SensorConnection {
        let (tx, rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = Duration::from_secs_f64(1.0 / rate_hz.max(0.1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut step: u32 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let frame = simulated_frame(step);
                        step = step.wrapping_add(1);
                        if tx.send(SensorEvent::Chunk(frame.into_bytes())).await.is_err() {
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        let source = MockSensor {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        };
        SensorConnection::new(Box::new(source), rx)
    }
}

/// Triangle waves with a fixed baseline per channel.
fn simulated_frame(step: u32) -> String {
    let wave = |period: u32, amplitude: i32| {
        let phase = (step % period) as i32;
        let half = (period / 2) as i32;
        amplitude * (half - (phase - half).abs()) / half.max(1)
    };
    format!(
        "{},{},{}\n",
        120 + wave(40, 15),
        80 + wave(60, 25),
        95 + wave(50, 20)
    )
}

impl SensorSource for MockSensor {
    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// =============================================================================
// ManualSensor - Test-driven input
// =============================================================================

/// Sensor whose chunks are pushed by the caller.
pub struct ManualSensor {
    name: String,
}

impl ManualSensor {
    /// Connection plus the sender that feeds it.
    pub fn connect(name: impl Into<String>) -> (mpsc::Sender<SensorEvent>, SensorConnection) {
        let (tx, rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        let source = ManualSensor { name: name.into() };
        (tx, SensorConnection::new(Box::new(source), rx))
    }
}

impl SensorSource for ManualSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {}
}

// =============================================================================
// MockTrigger - Counting peripheral
// =============================================================================

/// Trigger channel that records how often it fired.
///
/// Clones share counters, so a test can keep one handle and give the other away.
#[derive(Clone, Default)]
pub struct MockTrigger {
    count: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    fail: Arc<AtomicBool>,
}

impl MockTrigger {
    /// A connected, healthy trigger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following trigger fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Successful triggers so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Failed triggers so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }
}

impl TriggerChannel for MockTrigger {
    fn is_connected(&self) -> bool {
        true
    }

    fn trigger(&mut self) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(RigError::Transport("mock trigger unplugged".into()));
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::parse_frame;

    #[test]
    fn simulated_frames_parse() {
        for step in 0..200 {
            assert!(parse_frame(&simulated_frame(step)).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mock_sensor_emits_frames() {
        let mut conn = MockSensor::spawn(50.0);
        for _ in 0..3 {
            match conn.recv().await {
                Some(SensorEvent::Chunk(bytes)) => assert!(bytes.ends_with(b"\n")),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(conn.name(), "mock");
        conn.close();
    }

    #[test]
    fn mock_trigger_counts_and_fails() {
        let handle = MockTrigger::new();
        let mut trigger = handle.clone();
        trigger.trigger().unwrap();
        handle.set_failing(true);
        assert!(trigger.trigger().is_err());
        assert_eq!(handle.count(), 1);
        assert_eq!(handle.failures(), 1);
    }
}
