//! Simulated signal generator.

use super::bench::SharedBench;
use bode_common::instrument::{Channel, InstrumentError, StimulusController, Waveform};
use tracing::trace;

/// Signal generator writing into the shared bench.
pub struct SimulatedGenerator {
    bench: SharedBench,
    max_hz: f64,
}

impl SimulatedGenerator {
    /// Create a generator on `bench`.
    pub fn new(bench: SharedBench) -> Self {
        let max_hz = bench.lock().config.generator_max_hz;
        Self { bench, max_hz }
    }

    fn with_output<F>(&mut self, channel: Channel, apply: F) -> Result<(), InstrumentError>
    where
        F: FnOnce(&mut super::bench::GeneratorOutput),
    {
        let mut bench = self.bench.lock();
        bench.commands += 1;
        let output = bench.outputs.get_mut(&channel).ok_or_else(|| {
            InstrumentError::Unsupported(format!("generator has no output {channel}"))
        })?;
        apply(output);
        Ok(())
    }
}

impl StimulusController for SimulatedGenerator {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn set_waveform(&mut self, channel: Channel, waveform: Waveform) -> Result<(), InstrumentError> {
        trace!("AWG {channel}: waveform {waveform:?}");
        self.with_output(channel, |o| o.waveform = waveform)
    }

    fn set_frequency(&mut self, channel: Channel, hz: f64) -> Result<(), InstrumentError> {
        if !(hz > 0.0 && hz <= self.max_hz) {
            return Err(InstrumentError::Unsupported(format!(
                "frequency {hz} Hz outside (0, {}] Hz",
                self.max_hz
            )));
        }
        trace!("AWG {channel}: {hz} Hz");
        self.with_output(channel, |o| o.frequency_hz = hz)
    }

    fn set_amplitude(&mut self, channel: Channel, volts: f64) -> Result<(), InstrumentError> {
        if !(volts.is_finite() && volts > 0.0) {
            return Err(InstrumentError::Unsupported(format!(
                "amplitude {volts} Vpp must be > 0"
            )));
        }
        trace!("AWG {channel}: {volts} Vpp");
        self.with_output(channel, |o| o.amplitude_v = volts)
    }

    fn set_channel_enabled(&mut self, channel: Channel, enabled: bool) -> Result<(), InstrumentError> {
        trace!("AWG {channel}: output {}", if enabled { "on" } else { "off" });
        self.with_output(channel, |o| o.enabled = enabled)
    }

    fn max_frequency_hz(&self) -> Option<f64> {
        Some(self.max_hz)
    }
}
