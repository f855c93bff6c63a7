//! Bench configuration file.
//!
//! A bench is described by one TOML file (`bode.toml` by default):
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "bode-bench-01"
//!
//! [sweep]
//! min_hz = 10.0
//! max_hz = 100000.0
//! points = 60
//! measure_phase = true
//!
//! [channels]
//! stimulus = [0]
//! reference = 0
//! response = 1
//!
//! [range]
//! overflow_threshold = 10.0
//!
//! [driver_config.simulation]
//! dut = { kind = "low_pass", cutoff_hz = 1000.0 }
//! ```
//!
//! Every section is optional.

use crate::sweep::{ChannelMap, RangeConstraints, SweepOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

/// Failure to load or validate the bench file.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// Unreadable file or malformed TOML.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Values parse but cannot be used together.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// `log_level` values of the `[shared]` section (`"trace"` .. `"error"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, every instrument command.
    Trace,
    /// Autorange decisions and waits.
    Debug,
    /// One line per frequency point.
    #[default]
    Info,
    /// Invalid readings and cancelled sweeps.
    Warn,
    /// Failed sweeps only.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

fn default_service_name() -> String {
    "bode".to_string()
}

/// Common configuration fields, the `[shared]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Bench instance identifier, used in log output.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl SharedConfig {
    /// An empty `service_name` is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "[shared] service_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

/// Complete bench description loaded from `bode.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Logging and identity.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Sweep options.
    #[serde(default)]
    pub sweep: SweepOptions,

    /// Channel roles.
    #[serde(default)]
    pub channels: ChannelMap,

    /// Autorange constraints.
    #[serde(default)]
    pub range: RangeConstraints,

    /// `[driver_config.<driver>]` tables, decoded by each driver itself.
    #[serde(default)]
    pub driver_config: HashMap<String, toml::Value>,
}

impl BenchConfig {
    /// Validate every section.
    ///
    /// The frequency range is validated separately when the plan is built,
    /// so CLI overrides can still adjust it after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.sweep.validate()?;
        self.channels.validate()?;
        self.range.validate()?;
        Ok(())
    }

    /// Driver-specific section, if present.
    pub fn driver_section(&self, driver: &str) -> Option<&toml::Value> {
        self.driver_config.get(driver)
    }
}

/// TOML loading for any deserializable configuration type.
///
/// A missing file is `FileNotFound` so callers can fall back to defaults;
/// every other read or syntax failure is `ParseError`.
pub trait ConfigLoader: Sized + DeserializeOwned {
    /// Read and decode `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::FileNotFound),
            Err(e) => {
                return Err(ConfigError::ParseError(format!("{}: {e}", path.display())));
            }
        };

        toml::from_str(&text)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
    }
}

impl<T: DeserializeOwned> ConfigLoader for T {}
