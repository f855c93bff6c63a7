//! Sweep error taxonomy.

use bode_common::config::ConfigError;
use bode_common::instrument::{Channel, InstrumentError};
use std::fmt;
use thiserror::Error;

/// Why the autorange search gave up on a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// Correction needed beyond `min_scale` / `max_scale`
    ScaleLimit,
    /// `max_iterations` evaluations without acceptance
    IterationBudget,
    /// Per-point wall-clock budget exceeded
    Timeout,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExhaustReason::ScaleLimit => "scale limit reached",
            ExhaustReason::IterationBudget => "iteration budget spent",
            ExhaustReason::Timeout => "timeout",
        };
        f.write_str(text)
    }
}

/// Errors that end a sweep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    /// Malformed sweep parameters, raised before any instrument I/O.
    #[error("Invalid sweep range: {0}")]
    InvalidRange(String),

    /// Transport failure on either instrument.
    #[error("Device communication failed: {0}")]
    DeviceCommunication(#[from] InstrumentError),

    /// A channel kept returning implausible readings.
    #[error("No valid reading on {channel} after {attempts} attempts")]
    Sampling {
        /// Channel being read
        channel: Channel,
        /// Reads performed
        attempts: u32,
    },

    /// No acceptable vertical scale was found.
    #[error("Autorange exhausted on {channel} ({reason}): last scale {scale} V/div, amplitude {amplitude} V")]
    RangeExhausted {
        /// Channel being ranged
        channel: Channel,
        /// Scale at the time of giving up [V/div]
        scale: f64,
        /// Last valid amplitude [V]
        amplitude: f64,
        /// What ran out
        reason: ExhaustReason,
    },

    /// Autorange asked for a channel whose scale was never initialised.
    #[error("Channel {0} was not prepared for autorange")]
    UnpreparedChannel(Channel),

    /// Cooperative abort requested externally.
    #[error("Sweep cancelled")]
    Cancelled,
}

impl From<ConfigError> for SweepError {
    fn from(err: ConfigError) -> Self {
        SweepError::InvalidRange(err.to_string())
    }
}
