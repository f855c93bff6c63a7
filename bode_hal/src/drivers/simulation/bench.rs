//! Simulated bench: configuration, DUT model and shared instrument state.
//!
//! Generator and oscilloscope are separate capability objects but observe
//! the same physical setup, so both hold a handle to one [`BenchState`].

use bode_common::consts::DEFAULT_VERTICAL_DIVISIONS;
use bode_common::instrument::{BandwidthMode, Channel, Waveform};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared handle to the simulated bench.
pub type SharedBench = Arc<Mutex<BenchState>>;

fn default_gain() -> f64 {
    1.0
}

fn default_generator_max_hz() -> f64 {
    60.0e6
}

fn default_generator_channels() -> u8 {
    2
}

fn default_scope_channels() -> u8 {
    4
}

fn default_divisions() -> f64 {
    DEFAULT_VERTICAL_DIVISIONS
}

fn default_horizontal_divisions() -> f64 {
    10.0
}

fn default_adc_bits() -> u32 {
    8
}

fn default_band_limit_hz() -> f64 {
    20.0e6
}

fn default_timebase() -> f64 {
    1.0e-3
}

/// First-order device under test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DutModel {
    /// Frequency-independent gain
    Flat {
        /// Voltage gain
        #[serde(default = "default_gain")]
        gain: f64,
    },
    /// RC low pass
    LowPass {
        /// -3 dB frequency [Hz]
        cutoff_hz: f64,
        /// Pass-band voltage gain
        #[serde(default = "default_gain")]
        gain: f64,
    },
    /// CR high pass
    HighPass {
        /// -3 dB frequency [Hz]
        cutoff_hz: f64,
        /// Pass-band voltage gain
        #[serde(default = "default_gain")]
        gain: f64,
    },
}

impl DutModel {
    /// Magnitude and phase [deg] of the transfer function at `frequency_hz`.
    pub fn response(&self, frequency_hz: f64) -> (f64, f64) {
        match *self {
            DutModel::Flat { gain } => (gain, 0.0),
            DutModel::LowPass { cutoff_hz, gain } => {
                let x = frequency_hz / cutoff_hz;
                (gain / (1.0 + x * x).sqrt(), -x.atan().to_degrees())
            }
            DutModel::HighPass { cutoff_hz, gain } => {
                let x = frequency_hz / cutoff_hz;
                (
                    gain * x / (1.0 + x * x).sqrt(),
                    90.0 - x.atan().to_degrees(),
                )
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        let (gain, cutoff) = match *self {
            DutModel::Flat { gain } => (gain, None),
            DutModel::LowPass { cutoff_hz, gain } | DutModel::HighPass { cutoff_hz, gain } => {
                (gain, Some(cutoff_hz))
            }
        };
        if !(gain.is_finite() && gain > 0.0) {
            return Err(format!("dut gain must be > 0 (got {gain})"));
        }
        if let Some(fc) = cutoff {
            if !(fc.is_finite() && fc > 0.0) {
                return Err(format!("dut cutoff_hz must be > 0 (got {fc})"));
            }
        }
        Ok(())
    }
}

impl Default for DutModel {
    fn default() -> Self {
        DutModel::Flat { gain: 1.0 }
    }
}

/// Simulation settings, the `[driver_config.simulation]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Device between generator CH1 and oscilloscope CH2
    #[serde(default)]
    pub dut: DutModel,

    /// Highest frequency the generator accepts [Hz]
    #[serde(default = "default_generator_max_hz")]
    pub generator_max_hz: f64,

    /// Generator output count
    #[serde(default = "default_generator_channels")]
    pub generator_channels: u8,

    /// Oscilloscope input count
    #[serde(default = "default_scope_channels")]
    pub scope_channels: u8,

    /// Vertical divisions on screen
    #[serde(default = "default_divisions")]
    pub vertical_divisions: f64,

    /// Horizontal divisions on screen
    #[serde(default = "default_horizontal_divisions")]
    pub horizontal_divisions: f64,

    /// ADC resolution across the vertical window
    #[serde(default = "default_adc_bits")]
    pub adc_bits: u32,

    /// Corner of the bandwidth-limit filter [Hz]
    #[serde(default = "default_band_limit_hz")]
    pub band_limit_hz: f64,

    /// Timebase before the sweep touches it [s/div]
    #[serde(default = "default_timebase")]
    pub initial_timebase_s: f64,
}

impl SimulationConfig {
    /// Validate the simulation settings.
    pub fn validate(&self) -> Result<(), String> {
        self.dut.validate()?;
        if !(self.generator_max_hz > 0.0) {
            return Err("generator_max_hz must be > 0".to_string());
        }
        if self.generator_channels == 0 || self.scope_channels < 2 {
            return Err(
                "need at least one generator output and two oscilloscope inputs".to_string(),
            );
        }
        if !(self.vertical_divisions > 0.0 && self.horizontal_divisions > 0.0) {
            return Err("divisions must be > 0".to_string());
        }
        if !(1..=16).contains(&self.adc_bits) {
            return Err(format!("adc_bits must be in 1..=16 (got {})", self.adc_bits));
        }
        if !(self.band_limit_hz > 0.0 && self.initial_timebase_s > 0.0) {
            return Err("band_limit_hz and initial_timebase_s must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dut: DutModel::default(),
            generator_max_hz: default_generator_max_hz(),
            generator_channels: default_generator_channels(),
            scope_channels: default_scope_channels(),
            vertical_divisions: default_divisions(),
            horizontal_divisions: default_horizontal_divisions(),
            adc_bits: default_adc_bits(),
            band_limit_hz: default_band_limit_hz(),
            initial_timebase_s: default_timebase(),
        }
    }
}

/// One generator output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorOutput {
    /// Output shape
    pub waveform: Waveform,
    /// Frequency [Hz]
    pub frequency_hz: f64,
    /// Amplitude [Vpp]
    pub amplitude_v: f64,
    /// Output relay state
    pub enabled: bool,
}

impl Default for GeneratorOutput {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency_hz: 1000.0,
            amplitude_v: 1.0,
            enabled: false,
        }
    }
}

/// One oscilloscope input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScopeInput {
    /// Vertical scale [V/div]
    pub scale: f64,
    /// Bandwidth limit
    pub bandwidth: BandwidthMode,
}

impl Default for ScopeInput {
    fn default() -> Self {
        Self {
            scale: 1.0,
            bandwidth: BandwidthMode::Unrestricted,
        }
    }
}

/// Signal at an oscilloscope input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    /// True peak-to-peak amplitude [V]
    pub vpp: f64,
    /// Phase relative to the generator output [deg]
    pub phase_deg: f64,
    /// Period [s]
    pub period_s: f64,
}

/// Complete simulated bench.
///
/// Generator CH1 drives the DUT input, which is probed by oscilloscope
/// CH1; the DUT output is probed by oscilloscope CH2. Other inputs are
/// left unconnected.
#[derive(Debug, Clone)]
pub struct BenchState {
    /// Settings the bench was built from
    pub config: SimulationConfig,
    /// Generator outputs by channel
    pub outputs: BTreeMap<Channel, GeneratorOutput>,
    /// Oscilloscope inputs by channel
    pub inputs: BTreeMap<Channel, ScopeInput>,
    /// Horizontal scale [s/div]
    pub timebase_s: f64,
    /// Commands received by either instrument
    pub commands: u64,
}

impl BenchState {
    /// Build a bench in its power-on state.
    pub fn new(config: SimulationConfig) -> Self {
        let outputs = (0..config.generator_channels)
            .map(|i| (Channel(i), GeneratorOutput::default()))
            .collect();
        let inputs = (0..config.scope_channels)
            .map(|i| (Channel(i), ScopeInput::default()))
            .collect();
        let timebase_s = config.initial_timebase_s;
        Self {
            config,
            outputs,
            inputs,
            timebase_s,
            commands: 0,
        }
    }

    /// Wrap the bench for sharing between both instruments.
    pub fn shared(config: SimulationConfig) -> SharedBench {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Signal present at an oscilloscope input, before the input's own
    /// bandwidth limit. `None` for an unconnected input.
    pub fn trace(&self, input: Channel) -> Option<Trace> {
        let source = self.outputs.get(&Channel(0)).copied().unwrap_or_default();
        let drive = if source.enabled { source.amplitude_v } else { 0.0 };
        let period_s = 1.0 / source.frequency_hz;

        match input.0 {
            0 => Some(Trace {
                vpp: drive,
                phase_deg: 0.0,
                period_s,
            }),
            1 => {
                let (gain, phase_deg) = self.config.dut.response(source.frequency_hz);
                Some(Trace {
                    vpp: drive * gain,
                    phase_deg,
                    period_s,
                })
            }
            _ => None,
        }
    }

    /// Magnitude and phase [deg] of an input's bandwidth-limit filter.
    pub fn input_filter(&self, input: Channel, frequency_hz: f64) -> (f64, f64) {
        match self.inputs.get(&input).map(|i| i.bandwidth) {
            Some(BandwidthMode::BandLimited) => {
                let x = frequency_hz / self.config.band_limit_hz;
                (1.0 / (1.0 + x * x).sqrt(), -x.atan().to_degrees())
            }
            _ => (1.0, 0.0),
        }
    }

    /// Wrap a phase into (-180, 180].
    pub fn wrap_phase(degrees: f64) -> f64 {
        let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
        if wrapped <= -180.0 { wrapped + 360.0 } else { wrapped }
    }

    /// Horizontal window [s].
    pub fn screen_width_s(&self) -> f64 {
        self.timebase_s * self.config.horizontal_divisions
    }
}
