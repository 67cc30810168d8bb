//! Device connections owned by the application shell.
//!
//! Two independent links exist:
//!
//! - a **sensor source** that delivers raw byte chunks from the rig
//!   ([`SensorConnection`], backed by [`serial::SerialSensor`] or a mock), and
//! - a **trigger channel** that receives one sync byte per captured frame
//!   ([`trigger::TriggerChannel`]).
//!
//! Both are opened, closed and replaced by the shell. The capture core only
//! borrows them and treats a missing or failing device as a non-event.

pub mod mock;
pub mod serial;
pub mod trigger;

pub use serial::{available_ports, SerialSensor, SerialSettings};
pub use trigger::{SerialTrigger, TriggerChannel, TRIGGER_BYTE};

use tokio::sync::mpsc;

/// Capacity of the chunk channel between a sensor reader and the event loop.
pub const SENSOR_CHANNEL_CAPACITY: usize = 64;

/// Something that happened on a sensor link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorEvent {
    /// Bytes as delivered by one read
    Chunk(Vec<u8>),
    /// The link failed and will deliver nothing more
    Disconnected(String),
}

/// A running producer of [`SensorEvent`]s.
pub trait SensorSource: Send {
    /// Port name or other human-readable identifier.
    fn name(&self) -> &str;

    /// Stop producing events and release the device before returning.
    fn close(&mut self);
}

/// An open sensor link: the producer plus the receiving end of its events.
pub struct SensorConnection {
    // Dropped before the source so a reader blocked on a full channel can exit.
    events: mpsc::Receiver<SensorEvent>,
    source: Box<dyn SensorSource>,
}

impl SensorConnection {
    /// Pair a source with the channel it sends on.
    pub fn new(source: Box<dyn SensorSource>, events: mpsc::Receiver<SensorEvent>) -> Self {
        Self { source, events }
    }

    /// Identifier of the underlying source.
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Next event, or `None` once the producer has gone away.
    pub async fn recv(&mut self) -> Option<SensorEvent> {
        self.events.recv().await
    }

    /// Close the source and drop any queued events.
    pub fn close(mut self) {
        self.events.close();
        self.source.close();
    }
}
