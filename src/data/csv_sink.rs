//! CSV sink for captured frames.
//!
//! One sink owns at most one open file at a time. The header is written once
//! when the file is created; every row is flushed as soon as it is written, so a
//! crash or a pulled cable never leaves a half-written line behind.

use crate::error::{AppResult, RigError};
use crate::sensor::Reading;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Column names, in file order.
pub const CSV_HEADER: [&str; 7] = [
    "Timestamp",
    "Top Left",
    "Top Right",
    "Bottom Left",
    "Top Left w/o Zero",
    "Top Right w/o Zero",
    "Bottom Left w/o Zero",
];

/// Row timestamp format, millisecond precision, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// File name for a session started at `at`, e.g. `sensor_data_2024-05-01_13-45-10.csv`.
pub fn session_file_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.csv", prefix, at.format("%Y-%m-%d_%H-%M-%S"))
}

/// One data row: when it was captured and what the cache held at that moment.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRow {
    /// Wall-clock capture time
    pub timestamp: DateTime<Local>,
    /// Calibrated and raw channel values
    pub reading: Reading,
}

impl CaptureRow {
    /// Row stamped with the current local time.
    pub fn now(reading: Reading) -> Self {
        Self {
            timestamp: Local::now(),
            reading,
        }
    }

    fn to_record(self) -> [String; 7] {
        let Reading { calibrated, raw } = self.reading;
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            calibrated.top_left.to_string(),
            calibrated.top_right.to_string(),
            calibrated.bottom_left.to_string(),
            raw.top_left.to_string(),
            raw.top_right.to_string(),
            raw.bottom_left.to_string(),
        ]
    }
}

/// A writer for session CSV files.
#[derive(Default)]
pub struct CsvSink {
    path: Option<PathBuf>,
    writer: Option<csv::Writer<Box<dyn Write + Send>>>,
    recording: bool,
    rows: u64,
}

impl CsvSink {
    /// A sink with no file open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or truncate) `path`, write the header and start recording.
    ///
    /// Any file still open from a previous session is flushed and closed first.
    /// On error nothing is recording and no file is held open.
    pub fn start(&mut self, path: &Path) -> AppResult<()> {
        self.stop();

        let open_err = |source| RigError::CsvOpen {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = File::create(path).map_err(open_err)?;

        let mut writer = row_writer(Box::new(file));
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        self.writer = Some(writer);
        self.path = Some(path.to_path_buf());
        self.recording = true;
        self.rows = 0;
        info!(path = %path.display(), "CSV recording started");
        Ok(())
    }

    /// Append one row and flush it. Does nothing unless recording.
    pub fn write_row(&mut self, row: &CaptureRow) -> AppResult<()> {
        if !self.recording {
            return Ok(());
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        writer.write_record(row.to_record())?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Stop recording and close the file. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.recording = false;
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(error = %e, "final CSV flush failed");
            }
            info!(
                path = %self.path.as_deref().unwrap_or(Path::new("")).display(),
                rows = self.rows,
                "CSV recording stopped"
            );
        }
    }

    /// Whether rows are currently being accepted.
    pub fn is_recording(&self) -> bool {
        self.recording && self.writer.is_some()
    }

    /// Path of the current (or most recent) file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Data rows written to the current (or most recent) file.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }
}

fn row_writer(out: Box<dyn Write + Send>) -> csv::Writer<Box<dyn Write + Send>> {
    csv::WriterBuilder::new().has_headers(false).from_writer(out)
}

#[cfg(test)]
impl CsvSink {
    /// Send further rows of the running session to `out` instead of the file.
    pub(crate) fn redirect(&mut self, out: Box<dyn Write + Send>) {
        self.writer = Some(row_writer(out));
    }
}

/// Output that fails every write, like a full disk.
#[cfg(test)]
pub(crate) struct FullDisk;

#[cfg(test)]
impl Write for FullDisk {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "No space left on device",
        ))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorFrame;
    use chrono::TimeZone;

    fn sample_row() -> CaptureRow {
        CaptureRow {
            timestamp: Local
                .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
                .single()
                .unwrap(),
            reading: Reading {
                calibrated: SensorFrame::new(3, 1, 2),
                raw: SensorFrame::new(30, 10, 20),
            },
        }
    }

    #[test]
    fn header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut sink = CsvSink::new();
        sink.start(&path).unwrap();
        assert!(sink.is_recording());
        sink.write_row(&sample_row()).unwrap();

        // Flushed per row, readable before stop.
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Timestamp,Top Left,Top Right,Bottom Left,Top Left w/o Zero,Top Right w/o Zero,Bottom Left w/o Zero\n\
             2024-03-09 14:05:07.000,1,2,3,10,20,30\n"
        );
        sink.stop();
        assert_eq!(sink.rows_written(), 1);
    }

    #[test]
    fn rows_ignored_when_not_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut sink = CsvSink::new();
        sink.write_row(&sample_row()).unwrap();
        sink.start(&path).unwrap();
        sink.stop();
        sink.write_row(&sample_row()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(sink.rows_written(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut sink = CsvSink::new();
        sink.stop();
        sink.stop();
        assert!(!sink.is_recording());
        assert!(sink.path().is_none());
    }

    #[test]
    fn start_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale\nstale\nstale\n").unwrap();

        let mut sink = CsvSink::new();
        sink.start(&path).unwrap();
        sink.stop();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Timestamp,"));
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn start_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.csv");

        let mut sink = CsvSink::new();
        sink.start(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn open_failure_leaves_sink_idle() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a file.
        let mut sink = CsvSink::new();
        let err = sink.start(dir.path()).unwrap_err();
        assert!(matches!(err, RigError::CsvOpen { .. }));
        assert!(!sink.is_recording());
    }

    #[test]
    fn write_failure_is_returned_and_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new();
        sink.start(&dir.path().join("out.csv")).unwrap();
        sink.write_row(&sample_row()).unwrap();

        sink.redirect(Box::new(FullDisk));
        let err = sink.write_row(&sample_row()).unwrap_err();
        assert!(matches!(err, RigError::Io(_) | RigError::Csv(_)));
        assert_eq!(sink.rows_written(), 1);
    }

    #[test]
    fn file_name_uses_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().unwrap();
        assert_eq!(
            session_file_name("sensor_data", at),
            "sensor_data_2024-01-02_03-04-05.csv"
        );
    }
}
