//! Instrument capability traits and reading types.
//!
//! This module defines:
//! - `StimulusController` trait - Interface to the signal generator
//! - `ResponseSampler` trait - Interface to the oscilloscope
//! - `InstrumentError` enum - Transport-level failures
//! - `ReadingBounds` / `Amplitude` - Guarded readings

use crate::consts::PHASE_LIMIT_DEG;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error types for instrument operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstrumentError {
    /// Instrument could not be brought up
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Transport failure while talking to an instrument
    #[error("Instrument communication error: {0}")]
    Communication(String),

    /// Command outside of what the instrument can do
    #[error("Unsupported by instrument: {0}")]
    Unsupported(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Zero-based instrument channel index.
///
/// Displayed the way front panels label them (`CH1` for index 0).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Channel(pub u8);

impl Channel {
    /// Channel index usable for slice access.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", u16::from(self.0) + 1)
    }
}

/// Generator output waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Sine, the only shape a Bode sweep is meaningful with
    #[default]
    Sine,
    /// Square
    Square,
    /// Triangle
    Triangle,
}

/// Oscilloscope channel bandwidth limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BandwidthMode {
    /// Full analog bandwidth
    #[default]
    Unrestricted,
    /// 20 MHz hardware filter engaged
    BandLimited,
}

/// Amplitude reading after the plausibility guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amplitude {
    /// Peak-to-peak volts inside the plausible band
    Valid(f64),
    /// Instrument error, never real signal
    Invalid,
}

impl Amplitude {
    /// The reading in volts, if valid.
    pub fn volts(self) -> Option<f64> {
        match self {
            Amplitude::Valid(v) => Some(v),
            Amplitude::Invalid => None,
        }
    }

    /// Returns true for a valid reading.
    pub fn is_valid(self) -> bool {
        matches!(self, Amplitude::Valid(_))
    }
}

/// Plausible band for amplitude readings.
///
/// Anything outside `[epsilon, huge]` (or non-finite) is an instrument
/// error rather than a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingBounds {
    /// Smallest reading treated as real signal [V]
    pub epsilon: f64,
    /// Largest reading treated as real signal [V]
    pub huge: f64,
}

impl ReadingBounds {
    /// Classify a raw peak-to-peak reading.
    pub fn classify(&self, raw: f64) -> Amplitude {
        if raw.is_finite() && raw >= self.epsilon && raw <= self.huge {
            Amplitude::Valid(raw)
        } else {
            Amplitude::Invalid
        }
    }
}

impl Default for ReadingBounds {
    fn default() -> Self {
        Self {
            epsilon: 1.0e-9,
            huge: 1000.0,
        }
    }
}

/// Classify a raw phase reading; anything non-finite or beyond one turn is absent.
pub fn classify_phase(raw: f64) -> Option<f64> {
    (raw.is_finite() && raw.abs() <= PHASE_LIMIT_DEG).then_some(raw)
}

/// Trait defining the signal generator seam.
///
/// The sweep owns the generator exclusively for its whole duration; no
/// two commands are ever issued concurrently.
///
/// # Errors
///
/// Every operation may fail with `InstrumentError`; the sweep treats any
/// failure as fatal.
pub trait StimulusController: Send {
    /// Returns the binding's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Select the output waveform.
    fn set_waveform(&mut self, channel: Channel, waveform: Waveform)
    -> Result<(), InstrumentError>;

    /// Set the output frequency in Hz.
    fn set_frequency(&mut self, channel: Channel, hz: f64) -> Result<(), InstrumentError>;

    /// Set the output amplitude in peak-to-peak volts.
    fn set_amplitude(&mut self, channel: Channel, volts: f64) -> Result<(), InstrumentError>;

    /// Switch the channel output on or off.
    fn set_channel_enabled(&mut self, channel: Channel, enabled: bool)
    -> Result<(), InstrumentError>;

    /// Highest frequency the generator can produce, if known.
    /// Default: None
    fn max_frequency_hz(&self) -> Option<f64> {
        None
    }
}

/// Trait defining the oscilloscope seam.
///
/// Bindings implement the raw `read_*` queries; the guarded [`amplitude`]
/// and [`phase`] methods are the only way the sweep reads values, so the
/// plausibility check lives in one place.
///
/// [`amplitude`]: ResponseSampler::amplitude
/// [`phase`]: ResponseSampler::phase
pub trait ResponseSampler: Send {
    /// Returns the binding's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Raw peak-to-peak measurement as reported by the instrument.
    fn read_vpp(&mut self, channel: Channel) -> Result<f64, InstrumentError>;

    /// Raw rising-edge phase of `channel` relative to `reference`, in degrees.
    fn read_phase(&mut self, reference: Channel, channel: Channel)
    -> Result<f64, InstrumentError>;

    /// Set the vertical scale in volts per division.
    fn set_vertical_scale(&mut self, channel: Channel, volts_per_div: f64)
    -> Result<(), InstrumentError>;

    /// Set the horizontal scale in seconds per division.
    fn set_timebase_scale(&mut self, seconds_per_div: f64) -> Result<(), InstrumentError>;

    /// Engage or release the channel bandwidth limit.
    fn set_bandwidth_limit(&mut self, channel: Channel, mode: BandwidthMode)
    -> Result<(), InstrumentError>;

    /// Guarded amplitude read.
    fn amplitude(
        &mut self,
        channel: Channel,
        bounds: &ReadingBounds,
    ) -> Result<Amplitude, InstrumentError> {
        let raw = self.read_vpp(channel)?;
        Ok(bounds.classify(raw))
    }

    /// Guarded phase read; an unreadable phase is `None`, never zero.
    fn phase(
        &mut self,
        reference: Channel,
        channel: Channel,
    ) -> Result<Option<f64>, InstrumentError> {
        let raw = self.read_phase(reference, channel)?;
        Ok(classify_phase(raw))
    }
}
