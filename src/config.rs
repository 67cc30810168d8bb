//! Configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`RigConfig::default()`)
//! 2. `config/rig_capture.toml` (or the file given with `--config`)
//! 3. Environment variables prefixed with `RIG_CAPTURE_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use rig_capture::config::RigConfig;
//!
//! let config = RigConfig::load()?;
//! println!("Writing to {}", config.output_dir().display());
//! # Ok::<(), figment::Error>(())
//! ```

use crate::capture::OutputTarget;
use crate::hardware::serial::{SerialSettings, SENSOR_BAUD_RATE, TRIGGER_BAUD_RATE};
use crate::validation::{is_in_range, is_positive_finite, is_valid_file_prefix, is_valid_port_name};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/rig_capture.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "RIG_CAPTURE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Sensing device port
    #[serde(default)]
    pub sensor: SensorPortConfig,
    /// Trigger peripheral port
    #[serde(default)]
    pub trigger: TriggerPortConfig,
    /// Capture defaults and output location
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Sensing device serial port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPortConfig {
    /// Port to open at startup, if any
    #[serde(default)]
    pub port_name: Option<String>,
    /// Communication speed
    #[serde(default = "default_sensor_baud")]
    pub baud_rate: u32,
    /// Port read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Trigger peripheral serial port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPortConfig {
    /// Port to open at startup, if any
    #[serde(default)]
    pub port_name: Option<String>,
    /// Communication speed
    #[serde(default = "default_trigger_baud")]
    pub baud_rate: u32,
    /// Port write timeout in milliseconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Capture defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Frame rate used when none is given on the command line
    #[serde(default = "default_fps")]
    pub frames_per_second: f64,
    /// Capture length used when none is given on the command line
    #[serde(default = "default_duration")]
    pub duration_seconds: f64,
    /// Directory for CSV files; the desktop when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// CSV file name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_name() -> String {
    "Rig Capture".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sensor_baud() -> u32 {
    SENSOR_BAUD_RATE
}

fn default_trigger_baud() -> u32 {
    TRIGGER_BAUD_RATE
}

fn default_read_timeout() -> u64 {
    100
}

fn default_write_timeout() -> u64 {
    50
}

fn default_fps() -> f64 {
    30.0
}

fn default_duration() -> f64 {
    10.0
}

fn default_file_prefix() -> String {
    "sensor_data".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SensorPortConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: default_sensor_baud(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl Default for TriggerPortConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: default_trigger_baud(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_per_second: default_fps(),
            duration_seconds: default_duration(),
            output_dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

impl RigConfig {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables can override configuration with prefix RIG_CAPTURE_
    /// Example: RIG_CAPTURE_APPLICATION__LOG_LEVEL=debug
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file is not an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(RigConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        for (section, port, baud) in [
            ("sensor", &self.sensor.port_name, self.sensor.baud_rate),
            ("trigger", &self.trigger.port_name, self.trigger.baud_rate),
        ] {
            is_in_range(baud, 1..=4_000_000)
                .map_err(|e| format!("Invalid {section}.baud_rate {baud}: {e}"))?;
            if let Some(port) = port {
                is_valid_port_name(port).map_err(|e| format!("Invalid {section}.port_name: {e}"))?;
            }
        }

        is_positive_finite(self.capture.frames_per_second, "capture.frames_per_second")?;
        is_positive_finite(self.capture.duration_seconds, "capture.duration_seconds")?;
        is_valid_file_prefix(&self.capture.file_prefix)
            .map_err(|e| format!("Invalid capture.file_prefix: {e}"))?;

        Ok(())
    }

    /// Directory for CSV files: configured, else the desktop, else the working directory.
    pub fn output_dir(&self) -> PathBuf {
        self.capture
            .output_dir
            .clone()
            .or_else(dirs::desktop_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Output target for the capture engine.
    pub fn output_target(&self) -> OutputTarget {
        OutputTarget::new(self.output_dir(), self.capture.file_prefix.clone())
    }

    /// Serial settings for the sensing device on `port_name`.
    pub fn sensor_settings(&self, port_name: &str) -> SerialSettings {
        SerialSettings::new(port_name, self.sensor.baud_rate)
            .with_timeout(Duration::from_millis(self.sensor.read_timeout_ms))
    }

    /// Serial settings for the trigger peripheral on `port_name`.
    pub fn trigger_settings(&self, port_name: &str) -> SerialSettings {
        SerialSettings::new(port_name, self.trigger.baud_rate)
            .with_timeout(Duration::from_millis(self.trigger.write_timeout_ms))
    }

    /// Render as TOML, e.g. to seed a configuration file.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
