//! Custom error types for the application.
//!
//! This module defines the primary error type, `RigError`, shared by the capture
//! core and the application shell. Using the `thiserror` crate, it provides a
//! centralized way to describe everything that can go wrong while acquiring and
//! recording sensor data.
//!
//! ## Error Hierarchy
//!
//! - **`Validation`**: Capture parameters that were rejected before any side effect
//!   happened (non-positive or non-finite frame rate or duration).
//! - **`CsvOpen`**: The CSV destination could not be created. This aborts the start of
//!   a capture session; the engine stays idle.
//! - **`Csv`** / **`Io`**: Failures while writing rows to an already open sink.
//! - **`Transport`**: A trigger could not be handed to the peripheral. The capture
//!   engine swallows these and only logs them.
//! - **`Serial`**, **`SerialFeatureDisabled`**: Problems
//!   opening or using the serial connections owned by the application shell.
//!
//! Malformed sensor input is not represented here. The frame parser drops it
//! silently, see [`crate::sensor::parser::FrameParseError`].

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, RigError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum RigError {
    #[error("Invalid capture parameters: {0}")]
    Validation(String),

    #[error("Failed to create CSV file '{path}': {source}")]
    CsvOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trigger not delivered: {0}")]
    Transport(String),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,
}

impl RigError {
    /// Whether the error must be reported to the user synchronously.
    ///
    /// Transport failures are best-effort and only ever logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, RigError::Transport(_))
    }
}

#[cfg(feature = "instrument_serial")]
impl From<serialport::Error> for RigError {
    fn from(err: serialport::Error) -> Self {
        RigError::Serial(err.to_string())
    }
}
