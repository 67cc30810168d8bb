//! Peripheral trigger channel.
//!
//! Fire-and-forget: one ASCII `'1'` per captured frame, nothing is read back.
//! A channel that is not connected accepts triggers silently.
//!
//! Port writes can block for the whole write timeout, so they happen on a
//! dedicated writer thread. `trigger` only queues the byte and never waits.
//! Triggers still queued when the channel is dropped are discarded.

use super::serial::SerialSettings;
use crate::error::{AppResult, RigError};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// The byte written to the peripheral for each captured frame.
pub const TRIGGER_BYTE: u8 = b'1';

/// Triggers that may wait for the writer thread before new ones are refused.
pub const TRIGGER_QUEUE_CAPACITY: usize = 8;

/// Write-only sync output to a secondary device.
pub trait TriggerChannel: Send {
    /// Whether a device is attached.
    fn is_connected(&self) -> bool;

    /// Send one trigger. Must not block.
    ///
    /// # Returns
    /// - Ok(()) if the byte was handed off, or if nothing is connected
    /// - Err(RigError::Transport) if the byte could not be delivered
    fn trigger(&mut self) -> AppResult<()>;
}

/// Trigger channel feeding a writer thread.
#[derive(Default)]
pub struct SerialTrigger {
    port_name: Option<String>,
    queue: Option<mpsc::Sender<u8>>,
    stop: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
}

impl SerialTrigger {
    /// A channel with no device attached. Triggers are no-ops.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Open the trigger port (8N1, no flow control).
    #[cfg(feature = "instrument_serial")]
    pub fn open(settings: &SerialSettings) -> AppResult<Self> {
        let port = settings.open()?;
        tracing::info!(port = %settings.port_name, baud = settings.baud_rate, "trigger port opened");
        Self::from_writer(settings.port_name.clone(), port)
    }

    /// Open the trigger port (8N1, no flow control).
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open(_settings: &SerialSettings) -> AppResult<Self> {
        Err(RigError::SerialFeatureDisabled)
    }

    /// Drive any byte sink as a trigger device.
    ///
    /// The sink is moved onto a thread named `trigger-writer`. Dropping the
    /// channel waits for at most the write in progress.
    pub fn from_writer<W>(port_name: impl Into<String>, writer: W) -> AppResult<Self>
    where
        W: Write + Send + 'static,
    {
        let port_name = port_name.into();
        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            let port_name = port_name.clone();
            std::thread::Builder::new()
                .name("trigger-writer".into())
                .spawn(move || write_loop(writer, rx, stop, port_name))?
        };

        Ok(Self {
            port_name: Some(port_name),
            queue: Some(tx),
            stop,
            writer: Some(handle),
        })
    }
}

impl TriggerChannel for SerialTrigger {
    fn is_connected(&self) -> bool {
        self.queue.is_some()
    }

    fn trigger(&mut self) -> AppResult<()> {
        let Some(queue) = self.queue.as_ref() else {
            return Ok(());
        };
        queue.try_send(TRIGGER_BYTE).map_err(|e| match e {
            TrySendError::Full(_) => RigError::Transport("trigger queue full".into()),
            TrySendError::Closed(_) => RigError::Transport("trigger writer stopped".into()),
        })
    }
}

impl Drop for SerialTrigger {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.queue.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!(port = ?self.port_name, "trigger writer panicked");
            }
            debug!(port = ?self.port_name, "trigger port closed");
        }
    }
}

fn write_loop<W: Write>(
    mut writer: W,
    mut queue: mpsc::Receiver<u8>,
    stop: Arc<AtomicBool>,
    port_name: String,
) {
    while let Some(byte) = queue.blocking_recv() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if let Err(e) = writer.write_all(&[byte]).and_then(|()| writer.flush()) {
            warn!(port = %port_name, error = %e, "trigger write failed");
        }
    }
    debug!(port = %port_name, "trigger writer exiting");
}
