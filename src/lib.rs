//! # Rig Capture Core Library
//!
//! This crate serves as the core library for the `rig-capture` application. It reads a
//! three-channel force sensor over a serial link, keeps the latest calibrated values, and
//! records them to CSV at a fixed frame rate for a fixed duration while sending one sync
//! byte per frame to a trigger peripheral. By organizing the project as a library, the
//! capture core can be driven by the console binary (`main.rs`), by tests, or by any
//! other front end.
//!
//! ## Crate Structure
//!
//! - **`app`**: The `RigApp` shell. Owns the device links and all core state and runs the
//!   single `tokio::select!` event loop that dispatches sensor input, capture ticks and
//!   control commands.
//! - **`capture`**: The timed capture engine (`CaptureEngine`), its session state machine
//!   and the frame/interval arithmetic of `CapturePlan`.
//! - **`config`**: Figment-based configuration (`RigConfig`) loaded from TOML and
//!   environment variables.
//! - **`data`**: The CSV sink that owns the output file of a session.
//! - **`display`**: Plain-text rendering of values, progress and status.
//! - **`error`**: The `RigError` enum shared across the crate.
//! - **`hardware`**: Sensor sources and trigger channels, real (serial) and simulated.
//! - **`sensor`**: Frame parsing, zero calibration and the live value cache.
//! - **`tracing_setup`**: Subscriber initialization for structured logging.
//! - **`validation`**: Small helpers for validating parameters and configuration.

pub mod app;
pub mod capture;
pub mod config;
pub mod data;
pub mod display;
pub mod error;
pub mod hardware;
pub mod sensor;
pub mod tracing_setup;
pub mod validation;
