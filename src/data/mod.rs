//! Recorded data output.

pub mod csv_sink;

pub use csv_sink::{session_file_name, CaptureRow, CsvSink, CSV_HEADER, TIMESTAMP_FORMAT};
