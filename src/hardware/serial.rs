//! Serial transport for the sensor and trigger devices.
//!
//! Reads from the sensor port block, so they run on a dedicated thread that
//! forwards each chunk to the event loop over a bounded channel. The event loop
//! itself never touches the port. Closing a link joins the thread, so the port
//! is free again as soon as `close` returns.

use super::{SensorConnection, SensorEvent, SensorSource, SENSOR_CHANNEL_CAPACITY};
use crate::error::{AppResult, RigError};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Baud rate of the sensing device.
pub const SENSOR_BAUD_RATE: u32 = 9600;

/// Baud rate of the trigger peripheral.
pub const TRIGGER_BAUD_RATE: u32 = 115_200;

/// Port parameters. Framing is always 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Communication speed
    pub baud_rate: u32,
    /// Read/write timeout of the underlying port
    pub timeout: Duration,
}

impl SerialSettings {
    /// Settings with a 100 ms port timeout.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_millis(100),
        }
    }

    /// Set the port timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(feature = "instrument_serial")]
    pub(crate) fn open(&self) -> AppResult<Box<dyn serialport::SerialPort>> {
        serialport::new(&self.port_name, self.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(|e| {
                RigError::Serial(format!(
                    "Failed to open serial port '{}' at {} baud: {}",
                    self.port_name, self.baud_rate, e
                ))
            })
    }
}

/// Names of the serial ports present on this machine.
#[cfg(feature = "instrument_serial")]
pub fn available_ports() -> AppResult<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

/// Names of the serial ports present on this machine.
#[cfg(not(feature = "instrument_serial"))]
pub fn available_ports() -> AppResult<Vec<String>> {
    Err(RigError::SerialFeatureDisabled)
}

/// Sensor link backed by a serial port and a reader thread.
pub struct SerialSensor {
    port_name: String,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialSensor {
    /// Open the sensor port and start forwarding chunks.
    #[cfg(feature = "instrument_serial")]
    pub fn open(settings: &SerialSettings) -> AppResult<SensorConnection> {
        let port = settings.open()?;
        let connection = Self::from_reader(settings.port_name.clone(), port)?;
        info!(port = %settings.port_name, baud = settings.baud_rate, "sensor port opened");
        Ok(connection)
    }

    /// Open the sensor port and start forwarding chunks.
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open(_settings: &SerialSettings) -> AppResult<SensorConnection> {
        Err(RigError::SerialFeatureDisabled)
    }

    /// Forward chunks from any blocking byte source.
    ///
    /// Reads that fail with `TimedOut` are retried, so the source should time
    /// out periodically for `close` to take effect.
    pub fn from_reader<R>(port_name: impl Into<String>, source: R) -> AppResult<SensorConnection>
    where
        R: Read + Send + 'static,
    {
        let port_name = port_name.into();
        let (tx, rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let stop = stop.clone();
            let port_name = port_name.clone();
            std::thread::Builder::new()
                .name("sensor-reader".into())
                .spawn(move || read_loop(source, tx, stop, port_name))?
        };

        let sensor = SerialSensor {
            port_name,
            stop,
            reader: Some(reader),
        };
        Ok(SensorConnection::new(Box::new(sensor), rx))
    }

    /// Stop the reader and wait until it has released the port.
    fn join_reader(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!(port = %self.port_name, "sensor reader panicked");
            }
        }
    }
}

impl SensorSource for SerialSensor {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn close(&mut self) {
        self.join_reader();
        debug!(port = %self.port_name, "sensor port closed");
    }
}

impl Drop for SerialSensor {
    fn drop(&mut self) {
        self.join_reader();
    }
}

fn read_loop<R: Read>(
    mut port: R,
    tx: mpsc::Sender<SensorEvent>,
    stop: Arc<AtomicBool>,
    port_name: String,
) {
    let mut buf = [0u8; 256];
    while !stop.load(Ordering::Relaxed) {
        let event = match port.read(&mut buf) {
            Ok(0) => SensorEvent::Disconnected(format!("{port_name}: end of stream")),
            Ok(n) => SensorEvent::Chunk(buf[..n].to_vec()),
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) => SensorEvent::Disconnected(format!("{port_name}: {e}")),
        };

        let disconnected = matches!(event, SensorEvent::Disconnected(_));
        if disconnected {
            warn!(port = %port_name, ?event, "sensor port read failed");
        }
        if tx.blocking_send(event).is_err() || disconnected {
            break;
        }
    }
    debug!(port = %port_name, "sensor reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_builder() {
        let settings = SerialSettings::new("/dev/ttyUSB0", SENSOR_BAUD_RATE)
            .with_timeout(Duration::from_millis(250));
        assert_eq!(settings.port_name, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout, Duration::from_millis(250));
    }

    /// Source that times out like an idle port and counts live handles.
    struct IdlePort {
        _handle: Arc<()>,
    }

    impl Read for IdlePort {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(ErrorKind::TimedOut.into())
        }
    }

    /// Source that always has data ready.
    struct ChattyPort;

    impl Read for ChattyPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            buf[..6].copy_from_slice(b"1,2,3\n");
            Ok(6)
        }
    }

    #[test]
    fn close_releases_the_port_before_returning() {
        let handle = Arc::new(());
        let conn = SerialSensor::from_reader(
            "idle",
            IdlePort {
                _handle: handle.clone(),
            },
        )
        .unwrap();
        assert_eq!(conn.name(), "idle");
        assert_eq!(Arc::strong_count(&handle), 2);

        conn.close();
        assert_eq!(Arc::strong_count(&handle), 1);
    }

    #[test]
    fn close_with_a_full_channel_does_not_hang() {
        let conn = SerialSensor::from_reader("chatty", ChattyPort).unwrap();
        // Nobody receives, so the reader fills the channel and blocks on send.
        std::thread::sleep(Duration::from_millis(20));
        conn.close();
    }

    #[cfg(feature = "instrument_serial")]
    #[test]
    fn opening_missing_port_fails() {
        let settings = SerialSettings::new("/dev/rig-capture-no-such-port", TRIGGER_BAUD_RATE);
        let err = SerialSensor::open(&settings).err().unwrap();
        assert!(matches!(err, RigError::Serial(_)));
    }
}
