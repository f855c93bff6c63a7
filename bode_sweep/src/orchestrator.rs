//! Sweep orchestration.
//!
//! The `SweepOrchestrator` borrows both instruments exclusively for one
//! pass over a frequency plan. Points are measured strictly in plan order;
//! each is fully completed (range convergence, phase settle) before the
//! next frequency is commanded.
//!
//! # Per-point sequence
//!
//! 1. Set the frequency on every stimulus channel
//! 2. With autorange: set the timebase to one period over `timebase_divisions`
//! 3. Wait `extra_delay + settle_cycles / f`
//! 4. Autorange the response channel, or read it with bounded retries
//! 5. Optionally wait `phase_settle` and read phase
//! 6. Optionally read the reference channel and normalize
//! 7. Commit the `FrequencyPointResult`

use crate::autorange::AutoRangeEngine;
use crate::error::SweepError;
use crate::pacing::{CancelToken, Clock};
use crate::plan::FrequencyPlan;
use bode_common::instrument::{ResponseSampler, StimulusController};
use bode_common::sweep::{ChannelMap, FrequencyPointResult, RangeConstraints, SweepOptions};
use tracing::{debug, error, info, warn};

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    /// Every plan entry was measured
    Completed,
    /// Stopped by the cancel token
    Cancelled,
    /// Stopped by an error
    Failed,
}

/// Result of one sweep: committed points plus how it ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// Points in plan order; a prefix of the plan when the sweep stopped early
    pub points: Vec<FrequencyPointResult>,
    /// `Ok` when the whole plan was measured
    pub outcome: Result<(), SweepError>,
}

impl SweepReport {
    /// How the sweep ended.
    pub fn status(&self) -> SweepStatus {
        match &self.outcome {
            Ok(()) => SweepStatus::Completed,
            Err(SweepError::Cancelled) => SweepStatus::Cancelled,
            Err(_) => SweepStatus::Failed,
        }
    }

    /// Returns true when every plan entry was measured.
    pub fn is_complete(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The error that stopped the sweep, if any.
    pub fn error(&self) -> Option<&SweepError> {
        self.outcome.as_ref().err()
    }
}

/// Drives one sweep over borrowed instruments.
pub struct SweepOrchestrator<'a> {
    stimulus: &'a mut dyn StimulusController,
    sampler: &'a mut dyn ResponseSampler,
    clock: &'a mut dyn Clock,
    engine: AutoRangeEngine,
    cancel: CancelToken,
}

impl<'a> SweepOrchestrator<'a> {
    /// Create an orchestrator over the given instruments.
    pub fn new(
        stimulus: &'a mut dyn StimulusController,
        sampler: &'a mut dyn ResponseSampler,
        clock: &'a mut dyn Clock,
        constraints: RangeConstraints,
        cancel: CancelToken,
    ) -> Self {
        Self {
            stimulus,
            sampler,
            clock,
            engine: AutoRangeEngine::new(constraints),
            cancel,
        }
    }

    /// Autorange engine, for inspecting per-channel state after a run.
    pub fn engine(&self) -> &AutoRangeEngine {
        &self.engine
    }

    /// Run one pass over `plan`.
    ///
    /// Never panics on instrument trouble: the report carries the points
    /// committed so far and the error that stopped the sweep.
    pub fn run(
        &mut self,
        plan: &FrequencyPlan,
        channels: &ChannelMap,
        options: &SweepOptions,
    ) -> SweepReport {
        info!(
            "Sweep starting: {} points, {:.3} Hz .. {:.3} Hz ({:?}), stimulus={}, sampler={}",
            plan.len(),
            plan.first(),
            plan.last(),
            plan.spacing(),
            self.stimulus.name(),
            self.sampler.name()
        );

        let mut points = Vec::with_capacity(plan.len());
        let outcome = self.execute(plan, channels, options, &mut points);

        match &outcome {
            Ok(()) => info!("Sweep complete: {} points", points.len()),
            Err(SweepError::Cancelled) => {
                warn!("Sweep cancelled after {} of {} points", points.len(), plan.len())
            }
            Err(e) => error!(
                "Sweep failed after {} of {} points: {}",
                points.len(),
                plan.len(),
                e
            ),
        }

        SweepReport { points, outcome }
    }

    fn execute(
        &mut self,
        plan: &FrequencyPlan,
        channels: &ChannelMap,
        options: &SweepOptions,
        points: &mut Vec<FrequencyPointResult>,
    ) -> Result<(), SweepError> {
        self.validate(plan, channels, options)?;
        self.engine.reset();
        self.configure(plan, channels, options)?;

        for (index, frequency) in plan.iter().enumerate() {
            self.cancel.check()?;
            let point = self.measure_point(frequency, channels, options)?;
            info!(
                "[{}/{}] {:.3} Hz: {:.6} V{}{}",
                index + 1,
                plan.len(),
                point.frequency_hz,
                point.raw_amplitude,
                point
                    .normalized_amplitude
                    .map(|r| format!(", ratio {r:.6}"))
                    .unwrap_or_default(),
                point
                    .phase_deg
                    .map(|p| format!(", phase {p:.2}°"))
                    .unwrap_or_default(),
            );
            points.push(point);
        }
        Ok(())
    }

    /// Reject malformed parameters and unrepresentable waits before any
    /// instrument I/O.
    fn validate(
        &self,
        plan: &FrequencyPlan,
        channels: &ChannelMap,
        options: &SweepOptions,
    ) -> Result<(), SweepError> {
        if plan.is_empty() {
            return Err(SweepError::InvalidRange("empty frequency plan".to_string()));
        }
        options.validate()?;
        options.validate_timing(plan.first())?;
        channels.validate()?;
        self.engine.constraints().validate()?;

        if let Some(max_hz) = self.stimulus.max_frequency_hz() {
            if plan.last() > max_hz {
                return Err(SweepError::InvalidRange(format!(
                    "{:.3} Hz exceeds the generator maximum of {:.3} Hz",
                    plan.last(),
                    max_hz
                )));
            }
        }
        Ok(())
    }

    /// Instrument setup before the first point.
    fn configure(
        &mut self,
        plan: &FrequencyPlan,
        channels: &ChannelMap,
        options: &SweepOptions,
    ) -> Result<(), SweepError> {
        for &ch in &channels.stimulus {
            self.stimulus.set_waveform(ch, options.waveform)?;
            self.stimulus.set_amplitude(ch, options.stimulus_amplitude_v)?;
            self.stimulus.set_frequency(ch, plan.first())?;
            self.stimulus.set_channel_enabled(ch, true)?;
        }

        if options.auto_range {
            let initial = options.initial_scale();
            for ch in [channels.reference, channels.response] {
                self.engine
                    .prepare(&mut *self.sampler, ch, initial, options.bandwidth)?;
            }
        } else {
            debug!("Manual oscilloscope settings: scale and timebase left untouched");
            for ch in [channels.reference, channels.response] {
                self.sampler.set_bandwidth_limit(ch, options.bandwidth)?;
            }
        }

        self.clock.sleep(options.initial_settle(), &self.cancel)
    }

    fn measure_point(
        &mut self,
        frequency: f64,
        channels: &ChannelMap,
        options: &SweepOptions,
    ) -> Result<FrequencyPointResult, SweepError> {
        for &ch in &channels.stimulus {
            self.stimulus.set_frequency(ch, frequency)?;
        }
        if options.auto_range {
            self.sampler
                .set_timebase_scale(options.timebase_scale(frequency))?;
        }
        self.clock
            .sleep(options.settle_time(frequency), &self.cancel)?;

        let amplitude = if options.auto_range {
            self.engine
                .adjust(
                    &mut *self.sampler,
                    channels.response,
                    &mut *self.clock,
                    &self.cancel,
                    options.cycle_time(frequency),
                )?
                .amplitude
        } else {
            self.engine.read_amplitude(
                &mut *self.sampler,
                channels.response,
                &mut *self.clock,
                &self.cancel,
            )?
        };

        let phase = if options.measure_phase {
            self.clock.sleep(options.phase_settle(), &self.cancel)?;
            let reading = self.sampler.phase(channels.reference, channels.response)?;
            if reading.is_none() {
                debug!("{frequency:.3} Hz: phase unreadable, recorded as absent");
            }
            reading.map(|deg| options.phase_convention.apply(deg))
        } else {
            None
        };

        let normalized_amplitude = if options.normalize {
            let reference = self.engine.read_amplitude(
                &mut *self.sampler,
                channels.reference,
                &mut *self.clock,
                &self.cancel,
            )?;
            Some(amplitude / reference)
        } else {
            None
        };

        Ok(FrequencyPointResult {
            frequency_hz: frequency,
            raw_amplitude: amplitude,
            normalized_amplitude,
            phase_deg: phase,
        })
    }
}
