//! Sweep configuration and result types.
//!
//! This module contains the immutable configuration a sweep runs with:
//! - `SweepOptions` - Frequency range, stimulus and measurement switches
//! - `ChannelMap` - Which instrument channels play which role
//! - `RangeConstraints` - Autorange bounds, ratios and budgets
//! - `FrequencyPointResult` - One committed measurement

use crate::config::ConfigError;
use crate::consts::{
    DEFAULT_INITIAL_SETTLE_MS, DEFAULT_INSTRUMENT_SETTLE_MS, DEFAULT_PHASE_SETTLE_MS,
    DEFAULT_SETTLE_CYCLES, DEFAULT_TIMEBASE_DIVISIONS, DEFAULT_VERTICAL_DIVISIONS,
    INITIAL_SCALE_DIVISOR, MAX_SETTLE_S,
};
use crate::instrument::{BandwidthMode, Channel, ReadingBounds, Waveform};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_min_hz() -> f64 {
    100.0
}

fn default_max_hz() -> f64 {
    100_000.0
}

fn default_points() -> usize {
    50
}

fn default_stimulus_amplitude() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_initial_settle_ms() -> u64 {
    DEFAULT_INITIAL_SETTLE_MS
}

fn default_settle_cycles() -> f64 {
    DEFAULT_SETTLE_CYCLES
}

fn default_phase_settle_ms() -> u64 {
    DEFAULT_PHASE_SETTLE_MS
}

fn default_timebase_divisions() -> f64 {
    DEFAULT_TIMEBASE_DIVISIONS
}

/// Spacing of the stimulus frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    /// Evenly spaced in Hz
    Linear,
    /// Evenly spaced in decades
    #[default]
    Logarithmic,
}

/// Sign applied to phase readings before they are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseConvention {
    /// Record what the oscilloscope reports
    AsMeasured,
    /// Negate the oscilloscope reading so a lagging output is negative
    #[default]
    Inverted,
}

impl PhaseConvention {
    /// Apply the convention to a present reading.
    #[inline]
    pub fn apply(self, degrees: f64) -> f64 {
        match self {
            PhaseConvention::AsMeasured => degrees,
            PhaseConvention::Inverted => -degrees,
        }
    }
}

/// Sweep options, loaded from the `[sweep]` section and overridden by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepOptions {
    /// Lowest stimulus frequency [Hz]
    #[serde(default = "default_min_hz")]
    pub min_hz: f64,

    /// Highest stimulus frequency [Hz]
    #[serde(default = "default_max_hz")]
    pub max_hz: f64,

    /// Number of frequency points
    #[serde(default = "default_points")]
    pub points: usize,

    /// Linear or logarithmic frequency spacing
    #[serde(default)]
    pub spacing: Spacing,

    /// Generator output waveform
    #[serde(default)]
    pub waveform: Waveform,

    /// Generator amplitude [Vpp]
    #[serde(default = "default_stimulus_amplitude")]
    pub stimulus_amplitude_v: f64,

    /// Read phase at every point
    #[serde(default)]
    pub measure_phase: bool,

    /// Sign convention for phase readings
    #[serde(default)]
    pub phase_convention: PhaseConvention,

    /// Let the sweep drive vertical scale and timebase.
    /// `false` corresponds to manual oscilloscope settings.
    #[serde(default = "default_true")]
    pub auto_range: bool,

    /// Record response / reference instead of absolute volts
    #[serde(default)]
    pub normalize: bool,

    /// Extra delay after each frequency change [ms]
    #[serde(default)]
    pub extra_delay_ms: u64,

    /// Delay before the first point [ms]
    #[serde(default = "default_initial_settle_ms")]
    pub initial_settle_ms: u64,

    /// Signal periods to wait after a frequency change
    #[serde(default = "default_settle_cycles")]
    pub settle_cycles: f64,

    /// Delay before each phase read [ms]
    #[serde(default = "default_phase_settle_ms")]
    pub phase_settle_ms: u64,

    /// Horizontal divisions one period should span
    #[serde(default = "default_timebase_divisions")]
    pub timebase_divisions: f64,

    /// Bandwidth limit on every monitored channel
    #[serde(default)]
    pub bandwidth: BandwidthMode,
}

impl SweepOptions {
    /// Validate the options that are not part of the frequency range.
    ///
    /// The range itself (`min_hz`, `max_hz`, `points`) is checked when the
    /// frequency plan is generated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.stimulus_amplitude_v.is_finite() && self.stimulus_amplitude_v > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "stimulus_amplitude_v must be > 0 (got {})",
                self.stimulus_amplitude_v
            )));
        }
        if !(self.settle_cycles.is_finite() && self.settle_cycles >= 0.0) {
            return Err(ConfigError::ValidationError(
                "settle_cycles must be >= 0".to_string(),
            ));
        }
        if !(self.timebase_divisions.is_finite() && self.timebase_divisions > 0.0) {
            return Err(ConfigError::ValidationError(
                "timebase_divisions must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject settle waits longer than [`MAX_SETTLE_S`] for a plan whose
    /// lowest frequency is `lowest_hz`.
    ///
    /// Settle time shrinks with frequency, so the lowest point is the
    /// longest wait.
    pub fn validate_timing(&self, lowest_hz: f64) -> Result<(), ConfigError> {
        let settle_s = self.settle_cycles / lowest_hz + self.extra_delay_ms as f64 / 1000.0;
        if !(settle_s.is_finite() && settle_s <= MAX_SETTLE_S) {
            return Err(ConfigError::ValidationError(format!(
                "settle wait at {lowest_hz} Hz is {settle_s} s, above the {MAX_SETTLE_S} s limit"
            )));
        }
        for (name, ms) in [
            ("initial_settle_ms", self.initial_settle_ms),
            ("phase_settle_ms", self.phase_settle_ms),
        ] {
            if ms as f64 / 1000.0 > MAX_SETTLE_S {
                return Err(ConfigError::ValidationError(format!(
                    "{name} ({ms}) is above the {MAX_SETTLE_S} s limit"
                )));
            }
        }
        Ok(())
    }

    /// Wait after setting `frequency_hz`: the settle cycles plus the extra delay.
    pub fn settle_time(&self, frequency_hz: f64) -> Duration {
        Duration::from_millis(self.extra_delay_ms).saturating_add(self.cycle_time(frequency_hz))
    }

    /// Duration of `settle_cycles` periods at `frequency_hz`, saturating at
    /// `Duration::MAX`.
    pub fn cycle_time(&self, frequency_hz: f64) -> Duration {
        Duration::try_from_secs_f64(self.settle_cycles / frequency_hz).unwrap_or(Duration::MAX)
    }

    /// Timebase that shows one period over `timebase_divisions`.
    pub fn timebase_scale(&self, frequency_hz: f64) -> f64 {
        1.0 / frequency_hz / self.timebase_divisions
    }

    /// Vertical scale the monitored channels start from.
    pub fn initial_scale(&self) -> f64 {
        self.stimulus_amplitude_v / INITIAL_SCALE_DIVISOR
    }

    /// Delay before the first point.
    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    /// Delay before each phase read.
    pub fn phase_settle(&self) -> Duration {
        Duration::from_millis(self.phase_settle_ms)
    }
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            min_hz: default_min_hz(),
            max_hz: default_max_hz(),
            points: default_points(),
            spacing: Spacing::default(),
            waveform: Waveform::default(),
            stimulus_amplitude_v: default_stimulus_amplitude(),
            measure_phase: false,
            phase_convention: PhaseConvention::default(),
            auto_range: true,
            normalize: false,
            extra_delay_ms: 0,
            initial_settle_ms: default_initial_settle_ms(),
            settle_cycles: default_settle_cycles(),
            phase_settle_ms: default_phase_settle_ms(),
            timebase_divisions: default_timebase_divisions(),
            bandwidth: BandwidthMode::default(),
        }
    }
}

fn default_stimulus_channels() -> Vec<Channel> {
    vec![Channel(0)]
}

fn default_reference_channel() -> Channel {
    Channel(0)
}

fn default_response_channel() -> Channel {
    Channel(1)
}

/// Channel roles, loaded from the `[channels]` section.
///
/// Stimulus channels are generator outputs; reference and response are
/// oscilloscope inputs at the DUT input and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelMap {
    /// Generator channels driven with the stimulus
    #[serde(default = "default_stimulus_channels")]
    pub stimulus: Vec<Channel>,

    /// Oscilloscope channel probing the DUT input
    #[serde(default = "default_reference_channel")]
    pub reference: Channel,

    /// Oscilloscope channel probing the DUT output
    #[serde(default = "default_response_channel")]
    pub response: Channel,
}

impl ChannelMap {
    /// Validate the channel map.
    ///
    /// # Validation Rules
    /// 1. At least one stimulus channel
    /// 2. No duplicate stimulus channels
    /// 3. Reference and response are different oscilloscope channels
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stimulus.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one stimulus channel is required".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for ch in &self.stimulus {
            if !seen.insert(ch) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate stimulus channel: {ch}"
                )));
            }
        }

        if self.reference == self.response {
            return Err(ConfigError::ValidationError(format!(
                "reference and response cannot share {}",
                self.response
            )));
        }
        Ok(())
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            stimulus: default_stimulus_channels(),
            reference: default_reference_channel(),
            response: default_response_channel(),
        }
    }
}

fn default_min_scale() -> f64 {
    0.001
}

fn default_max_scale() -> f64 {
    10.0
}

fn default_target_ratio() -> f64 {
    2.0
}

fn default_overflow_threshold() -> f64 {
    10.0
}

fn default_divisions() -> f64 {
    DEFAULT_VERTICAL_DIVISIONS
}

fn default_growth_factor() -> f64 {
    3.0
}

fn default_shrink_factor() -> f64 {
    0.5
}

fn default_max_sample_attempts() -> u32 {
    5
}

fn default_max_iterations() -> u32 {
    20
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_instrument_settle_ms() -> u64 {
    DEFAULT_INSTRUMENT_SETTLE_MS
}

fn default_retry_delay_ms() -> u64 {
    50
}

/// Autorange constraints, loaded from the `[range]` section.
///
/// A reading `a` at scale `s` is acceptable when
/// `target_ratio * s <= a < min(overflow_threshold, full_scale_divisions * s)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeConstraints {
    /// Smallest vertical scale [V/div]
    #[serde(default = "default_min_scale")]
    pub min_scale: f64,

    /// Largest vertical scale [V/div]
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,

    /// Minimum amplitude, in divisions, before the scale is shrunk
    #[serde(default = "default_target_ratio")]
    pub target_ratio: f64,

    /// Absolute amplitude treated as saturated [V]
    #[serde(default = "default_overflow_threshold")]
    pub overflow_threshold: f64,

    /// Divisions in the vertical window; a reading filling it is pegged
    #[serde(default = "default_divisions")]
    pub full_scale_divisions: f64,

    /// Scale multiplier on overflow
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    /// Scale multiplier on under-resolution
    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: f64,

    /// Plausible amplitude band; readings outside are invalid
    #[serde(default)]
    pub reading_bounds: ReadingBounds,

    /// Reads per sample before giving up on invalid readings
    #[serde(default = "default_max_sample_attempts")]
    pub max_sample_attempts: u32,

    /// Evaluations per point before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget per point [ms]
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Instrument settle after a scale change [ms]
    #[serde(default = "default_instrument_settle_ms")]
    pub instrument_settle_ms: u64,

    /// Pause between reads of an invalid sample [ms]
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl RangeConstraints {
    /// Validate the constraints.
    ///
    /// # Validation Rules
    /// 1. `0 < min_scale < max_scale`
    /// 2. `full_scale_divisions` finite and `> 0`; `target_ratio > 0`,
    ///    `overflow_threshold > 0`
    /// 3. `growth_factor > 1`, `0 < shrink_factor < 1`
    /// 4. `growth_factor * target_ratio < full_scale_divisions` so a grown
    ///    scale never lands in the under-resolved band
    /// 5. `target_ratio / shrink_factor < full_scale_divisions` so a shrunk
    ///    scale never pegs the window
    /// 6. Bounds ordered, budgets non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_scale > 0.0 && self.min_scale < self.max_scale && self.max_scale.is_finite())
        {
            return Err(ConfigError::ValidationError(format!(
                "scale bounds must satisfy 0 < min_scale ({}) < max_scale ({})",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.full_scale_divisions.is_finite() && self.full_scale_divisions > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "full_scale_divisions must be finite and > 0 (got {})",
                self.full_scale_divisions
            )));
        }
        if !(self.target_ratio > 0.0 && self.overflow_threshold > 0.0) {
            return Err(ConfigError::ValidationError(
                "target_ratio and overflow_threshold must be > 0".to_string(),
            ));
        }
        if !(self.growth_factor > 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "growth_factor must be > 1 (got {})",
                self.growth_factor
            )));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "shrink_factor must be in (0, 1) (got {})",
                self.shrink_factor
            )));
        }
        if self.growth_factor * self.target_ratio >= self.full_scale_divisions {
            return Err(ConfigError::ValidationError(format!(
                "growth_factor * target_ratio ({}) must stay below full_scale_divisions ({})",
                self.growth_factor * self.target_ratio,
                self.full_scale_divisions
            )));
        }
        if self.target_ratio / self.shrink_factor >= self.full_scale_divisions {
            return Err(ConfigError::ValidationError(format!(
                "target_ratio / shrink_factor ({}) must stay below full_scale_divisions ({})",
                self.target_ratio / self.shrink_factor,
                self.full_scale_divisions
            )));
        }
        if !(self.reading_bounds.epsilon >= 0.0
            && self.reading_bounds.epsilon < self.reading_bounds.huge)
        {
            return Err(ConfigError::ValidationError(
                "reading_bounds must satisfy 0 <= epsilon < huge".to_string(),
            ));
        }
        if self.max_sample_attempts == 0 || self.max_iterations == 0 || self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "max_sample_attempts, max_iterations and timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp a scale into `[min_scale, max_scale]`.
    #[inline]
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Per-point wall-clock budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Instrument settle after a scale change.
    pub fn instrument_settle(&self) -> Duration {
        Duration::from_millis(self.instrument_settle_ms)
    }

    /// Pause between reads of an invalid sample.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RangeConstraints {
    fn default() -> Self {
        Self {
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            target_ratio: default_target_ratio(),
            overflow_threshold: default_overflow_threshold(),
            full_scale_divisions: default_divisions(),
            growth_factor: default_growth_factor(),
            shrink_factor: default_shrink_factor(),
            reading_bounds: ReadingBounds::default(),
            max_sample_attempts: default_max_sample_attempts(),
            max_iterations: default_max_iterations(),
            timeout_ms: default_timeout_ms(),
            instrument_settle_ms: default_instrument_settle_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// One committed frequency point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPointResult {
    /// Stimulus frequency [Hz]
    pub frequency_hz: f64,
    /// Response amplitude [Vpp]
    pub raw_amplitude: f64,
    /// Response / reference, when normalization is enabled
    pub normalized_amplitude: Option<f64>,
    /// Phase of response relative to reference [deg]
    pub phase_deg: Option<f64>,
}

impl FrequencyPointResult {
    /// The amplitude a consumer should plot: the ratio when present, else volts.
    pub fn amplitude(&self) -> f64 {
        self.normalized_amplitude.unwrap_or(self.raw_amplitude)
    }
}
