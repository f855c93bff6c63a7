//! Simulated oscilloscope.
//!
//! Measurements follow the behaviour of an 8-bit bench scope:
//! - A trace taller than the vertical window reads as the window height
//! - Readings are quantised to one ADC step; a flat trace reads one step
//! - Unconnected inputs report the instrument's invalid marker
//! - Phase needs one full period on screen and a visible trace on both inputs
//!
//! Phase is reported the way the instrument measures it, with a lagging
//! channel positive.

use super::bench::{BenchState, ScopeInput, SharedBench, Trace};
use bode_common::consts::INSTRUMENT_INVALID_READING;
use bode_common::instrument::{BandwidthMode, Channel, InstrumentError, ResponseSampler};
use tracing::trace;

/// Oscilloscope reading from the shared bench.
pub struct SimulatedScope {
    bench: SharedBench,
}

impl SimulatedScope {
    /// Create an oscilloscope on `bench`.
    pub fn new(bench: SharedBench) -> Self {
        Self { bench }
    }
}

fn input(bench: &BenchState, channel: Channel) -> Result<ScopeInput, InstrumentError> {
    bench
        .inputs
        .get(&channel)
        .copied()
        .ok_or_else(|| InstrumentError::Unsupported(format!("oscilloscope has no input {channel}")))
}

/// Amplitude as displayed on `channel` and its ADC step, or `None` if unconnected.
fn displayed(bench: &BenchState, channel: Channel, scope_in: ScopeInput) -> Option<(Trace, f64, f64)> {
    let trace = bench.trace(channel)?;
    let (gain, _) = bench.input_filter(channel, 1.0 / trace.period_s);
    let window = bench.config.vertical_divisions * scope_in.scale;
    let step = window / 2f64.powi(bench.config.adc_bits as i32);
    Some((trace, trace.vpp * gain, step))
}

impl ResponseSampler for SimulatedScope {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn read_vpp(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        let mut bench = self.bench.lock();
        bench.commands += 1;
        let scope_in = input(&bench, channel)?;

        let Some((_, vpp, step)) = displayed(&bench, channel, scope_in) else {
            return Ok(INSTRUMENT_INVALID_READING);
        };
        let window = bench.config.vertical_divisions * scope_in.scale;
        let reading = if vpp >= window {
            window
        } else {
            ((vpp / step).round() * step).max(step)
        };
        trace!("SCOPE {channel}: {reading} Vpp (true {vpp}, {} V/div)", scope_in.scale);
        Ok(reading)
    }

    fn read_phase(&mut self, reference: Channel, channel: Channel) -> Result<f64, InstrumentError> {
        let mut bench = self.bench.lock();
        bench.commands += 1;
        let ref_in = input(&bench, reference)?;
        let ch_in = input(&bench, channel)?;

        let (Some((ref_trace, ref_vpp, ref_step)), Some((ch_trace, ch_vpp, ch_step))) = (
            displayed(&bench, reference, ref_in),
            displayed(&bench, channel, ch_in),
        ) else {
            return Ok(INSTRUMENT_INVALID_READING);
        };
        if ref_vpp < ref_step || ch_vpp < ch_step || bench.screen_width_s() < ch_trace.period_s {
            return Ok(INSTRUMENT_INVALID_READING);
        }

        let frequency = 1.0 / ch_trace.period_s;
        let ref_phase = ref_trace.phase_deg + bench.input_filter(reference, frequency).1;
        let ch_phase = ch_trace.phase_deg + bench.input_filter(channel, frequency).1;
        let lag = -BenchState::wrap_phase(ch_phase - ref_phase);
        trace!("SCOPE {reference}->{channel}: {lag} deg");
        Ok(lag)
    }

    fn set_vertical_scale(&mut self, channel: Channel, volts_per_div: f64) -> Result<(), InstrumentError> {
        if !(volts_per_div.is_finite() && volts_per_div > 0.0) {
            return Err(InstrumentError::Unsupported(format!(
                "vertical scale {volts_per_div} V/div"
            )));
        }
        let mut bench = self.bench.lock();
        bench.commands += 1;
        let scope_in = bench.inputs.get_mut(&channel).ok_or_else(|| {
            InstrumentError::Unsupported(format!("oscilloscope has no input {channel}"))
        })?;
        scope_in.scale = volts_per_div;
        trace!("SCOPE {channel}: {volts_per_div} V/div");
        Ok(())
    }

    fn set_timebase_scale(&mut self, seconds_per_div: f64) -> Result<(), InstrumentError> {
        if !(seconds_per_div.is_finite() && seconds_per_div > 0.0) {
            return Err(InstrumentError::Unsupported(format!(
                "timebase {seconds_per_div} s/div"
            )));
        }
        let mut bench = self.bench.lock();
        bench.commands += 1;
        bench.timebase_s = seconds_per_div;
        trace!("SCOPE timebase: {seconds_per_div} s/div");
        Ok(())
    }

    fn set_bandwidth_limit(&mut self, channel: Channel, mode: BandwidthMode) -> Result<(), InstrumentError> {
        let mut bench = self.bench.lock();
        bench.commands += 1;
        let scope_in = bench.inputs.get_mut(&channel).ok_or_else(|| {
            InstrumentError::Unsupported(format!("oscilloscope has no input {channel}"))
        })?;
        scope_in.bandwidth = mode;
        trace!("SCOPE {channel}: bandwidth {mode:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::bench::{DutModel, SimulationConfig};
    use super::super::generator::SimulatedGenerator;
    use super::*;
    use bode_common::instrument::StimulusController;

    fn bench_with(dut: DutModel, hz: f64, volts: f64) -> (SharedBench, SimulatedScope) {
        let bench = BenchState::shared(SimulationConfig {
            dut,
            ..Default::default()
        });
        let mut awg = SimulatedGenerator::new(bench.clone());
        awg.set_frequency(Channel(0), hz).unwrap();
        awg.set_amplitude(Channel(0), volts).unwrap();
        awg.set_channel_enabled(Channel(0), true).unwrap();
        let scope = SimulatedScope::new(bench.clone());
        (bench, scope)
    }

    #[test]
    fn tall_trace_reads_window_height() {
        let (_, mut scope) = bench_with(DutModel::default(), 1000.0, 5.0);
        scope.set_vertical_scale(Channel(1), 0.1).unwrap();
        assert!((scope.read_vpp(Channel(1)).unwrap() - 0.8).abs() < 1e-12);

        scope.set_vertical_scale(Channel(1), 1.0).unwrap();
        let reading = scope.read_vpp(Channel(1)).unwrap();
        assert!((reading - 5.0).abs() <= 8.0 / 256.0);
    }

    #[test]
    fn flat_trace_reads_one_step() {
        let (bench, mut scope) = bench_with(DutModel::default(), 1000.0, 1.0);
        bench.lock().outputs.get_mut(&Channel(0)).unwrap().enabled = false;
        scope.set_vertical_scale(Channel(1), 1.0).unwrap();
        assert_eq!(scope.read_vpp(Channel(1)).unwrap(), 8.0 / 256.0);
    }

    #[test]
    fn unconnected_input_is_invalid() {
        let (_, mut scope) = bench_with(DutModel::default(), 1000.0, 1.0);
        assert_eq!(scope.read_vpp(Channel(2)).unwrap(), INSTRUMENT_INVALID_READING);
        assert!(matches!(
            scope.read_vpp(Channel(9)),
            Err(InstrumentError::Unsupported(_))
        ));
    }

    #[test]
    fn low_pass_lag_is_reported_positive() {
        let dut = DutModel::LowPass {
            cutoff_hz: 1000.0,
            gain: 1.0,
        };
        let (_, mut scope) = bench_with(dut, 1000.0, 1.0);
        scope.set_vertical_scale(Channel(0), 0.2).unwrap();
        scope.set_vertical_scale(Channel(1), 0.2).unwrap();
        let phase = scope.read_phase(Channel(0), Channel(1)).unwrap();
        assert!((phase - 45.0).abs() < 1e-9);
    }

    #[test]
    fn phase_needs_a_full_period_on_screen() {
        let (_, mut scope) = bench_with(DutModel::default(), 10.0, 1.0);
        // 1 ms/div shows 10 ms, a tenth of a period at 10 Hz
        scope.set_timebase_scale(1.0e-3).unwrap();
        assert_eq!(
            scope.read_phase(Channel(0), Channel(1)).unwrap(),
            INSTRUMENT_INVALID_READING
        );
        scope.set_timebase_scale(1.0 / 10.0 / 3.0).unwrap();
        assert_eq!(scope.read_phase(Channel(0), Channel(1)).unwrap(), 0.0);
    }

    #[test]
    fn bandwidth_limit_attenuates_near_corner() {
        let (_, mut scope) = bench_with(DutModel::default(), 20.0e6, 1.0);
        scope.set_vertical_scale(Channel(1), 0.2).unwrap();
        let open = scope.read_vpp(Channel(1)).unwrap();
        scope
            .set_bandwidth_limit(Channel(1), BandwidthMode::BandLimited)
            .unwrap();
        let limited = scope.read_vpp(Channel(1)).unwrap();
        assert!((open - 1.0).abs() < 0.01);
        assert!((limited - 1.0 / 2f64.sqrt()).abs() < 0.01);
    }

    #[test]
    fn rejects_nonsense_settings() {
        let (_, mut scope) = bench_with(DutModel::default(), 1000.0, 1.0);
        assert!(scope.set_vertical_scale(Channel(0), 0.0).is_err());
        assert!(scope.set_timebase_scale(f64::NAN).is_err());
        assert!(
            scope
                .set_bandwidth_limit(Channel(9), BandwidthMode::Unrestricted)
                .is_err()
        );
    }
}
