//! Vertical autorange for oscilloscope channels.
//!
//! Per channel and per frequency point the engine runs a bounded state
//! machine:
//!
//! ```text
//!   Sample ──invalid──► retry (≤ max_sample_attempts) ──► SamplingError
//!     │
//!     ▼
//!   Evaluate ──overflow──► scale × growth ─┐
//!     │      ──too small─► scale × shrink ─┤ wait, re-sample
//!     │                                    │ (≤ max_iterations, ≤ timeout)
//!     ▼                                    ▼
//!   Settled                         RangeExhausted
//! ```
//!
//! Overflow is evaluated before under-resolution. The accepted scale is
//! kept per channel so the next point starts its search from it.

use crate::error::{ExhaustReason, SweepError};
use crate::pacing::{CancelToken, Clock};
use bode_common::instrument::{Amplitude, BandwidthMode, Channel, ResponseSampler};
use bode_common::sweep::RangeConstraints;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of comparing one reading against the constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeVerdict {
    /// Signal pegged against the window; scale too small
    Overflow,
    /// Signal occupies too little of the window; scale too large
    UnderResolved,
    /// Reading usable at this scale
    Accept,
}

/// Classify `amplitude` measured at `scale`.
///
/// Overflow when `amplitude >= overflow_threshold` or the reading fills
/// `full_scale_divisions * scale`; under-resolved when
/// `amplitude < target_ratio * scale`.
pub fn evaluate_range(amplitude: f64, scale: f64, constraints: &RangeConstraints) -> RangeVerdict {
    if amplitude >= constraints.overflow_threshold
        || amplitude >= constraints.full_scale_divisions * scale
    {
        RangeVerdict::Overflow
    } else if amplitude < constraints.target_ratio * scale {
        RangeVerdict::UnderResolved
    } else {
        RangeVerdict::Accept
    }
}

/// Range state of one monitored channel, alive for one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRangeState {
    /// Current vertical scale [V/div]
    pub scale: f64,
    /// Bandwidth limit applied to the channel
    pub bandwidth: BandwidthMode,
}

/// Accepted (scale, amplitude) pair for one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    /// Channel that was ranged
    pub channel: Channel,
    /// Accepted vertical scale [V/div]
    pub scale: f64,
    /// Amplitude read at that scale [Vpp]
    pub amplitude: f64,
    /// Evaluations performed, including the accepting one
    pub iterations: u32,
}

/// Autorange engine owning the per-channel range state.
#[derive(Debug, Clone)]
pub struct AutoRangeEngine {
    constraints: RangeConstraints,
    channels: BTreeMap<Channel, ChannelRangeState>,
}

impl AutoRangeEngine {
    /// Create an engine with no prepared channels.
    pub fn new(constraints: RangeConstraints) -> Self {
        Self {
            constraints,
            channels: BTreeMap::new(),
        }
    }

    /// Constraints the engine works with.
    pub fn constraints(&self) -> &RangeConstraints {
        &self.constraints
    }

    /// Current state of a channel, if prepared.
    pub fn state(&self, channel: Channel) -> Option<ChannelRangeState> {
        self.channels.get(&channel).copied()
    }

    /// Forget all channel state.
    pub fn reset(&mut self) {
        self.channels.clear();
    }

    /// Push the bandwidth limit and a clamped initial scale to the instrument
    /// and start tracking the channel.
    pub fn prepare(
        &mut self,
        sampler: &mut dyn ResponseSampler,
        channel: Channel,
        initial_scale: f64,
        bandwidth: BandwidthMode,
    ) -> Result<ChannelRangeState, SweepError> {
        let scale = self.constraints.clamp_scale(initial_scale);
        sampler.set_bandwidth_limit(channel, bandwidth)?;
        sampler.set_vertical_scale(channel, scale)?;

        let state = ChannelRangeState { scale, bandwidth };
        self.channels.insert(channel, state);
        debug!("{channel} prepared at {scale} V/div, bandwidth {bandwidth:?}");
        Ok(state)
    }

    /// Read a valid amplitude, retrying implausible readings.
    ///
    /// # Errors
    /// `SweepError::Sampling` after `max_sample_attempts` invalid readings.
    pub fn read_amplitude(
        &self,
        sampler: &mut dyn ResponseSampler,
        channel: Channel,
        clock: &mut dyn Clock,
        cancel: &CancelToken,
    ) -> Result<f64, SweepError> {
        let attempts = self.constraints.max_sample_attempts;
        for attempt in 1..=attempts {
            match sampler.amplitude(channel, &self.constraints.reading_bounds)? {
                Amplitude::Valid(volts) => return Ok(volts),
                Amplitude::Invalid => {
                    debug!("{channel}: invalid reading (attempt {attempt}/{attempts})");
                    if attempt < attempts {
                        clock.sleep(self.constraints.retry_delay(), cancel)?;
                    }
                }
            }
        }

        warn!("{channel}: no valid reading after {attempts} attempts");
        Err(SweepError::Sampling { channel, attempts })
    }

    /// Range `channel` until its reading is acceptable.
    ///
    /// `cycle_settle` is the frequency-dependent part of the wait after a
    /// scale change; the fixed instrument settle is added to it.
    ///
    /// # Errors
    /// - `UnpreparedChannel` if [`prepare`](Self::prepare) was never called
    /// - `Sampling` if a read stays invalid
    /// - `RangeExhausted` at a scale limit, after `max_iterations`
    ///   evaluations, or past the per-point timeout
    /// - `DeviceCommunication` / `Cancelled` from the instrument or clock
    pub fn adjust(
        &mut self,
        sampler: &mut dyn ResponseSampler,
        channel: Channel,
        clock: &mut dyn Clock,
        cancel: &CancelToken,
        cycle_settle: Duration,
    ) -> Result<Settled, SweepError> {
        let mut state = self
            .state(channel)
            .ok_or(SweepError::UnpreparedChannel(channel))?;
        let started = clock.now();
        let settle = self.constraints.instrument_settle().saturating_add(cycle_settle);

        let mut amplitude = self.read_amplitude(sampler, channel, clock, cancel)?;

        for iteration in 1..=self.constraints.max_iterations {
            let proposed = match evaluate_range(amplitude, state.scale, &self.constraints) {
                RangeVerdict::Accept => {
                    debug!(
                        "{channel} settled at {} V/div, {amplitude} V ({iteration} evaluations)",
                        state.scale
                    );
                    return Ok(Settled {
                        channel,
                        scale: state.scale,
                        amplitude,
                        iterations: iteration,
                    });
                }
                RangeVerdict::Overflow => state.scale * self.constraints.growth_factor,
                RangeVerdict::UnderResolved => state.scale * self.constraints.shrink_factor,
            };

            let next = self.constraints.clamp_scale(proposed);
            if next == state.scale {
                return Err(self.exhausted(channel, state.scale, amplitude, ExhaustReason::ScaleLimit));
            }

            debug!("{channel}: {amplitude} V at {} V/div, rescaling to {next} V/div", state.scale);
            sampler.set_vertical_scale(channel, next)?;
            state.scale = next;
            self.channels.insert(channel, state);

            clock.sleep(settle, cancel)?;
            if clock.now().saturating_sub(started) > self.constraints.timeout() {
                return Err(self.exhausted(channel, state.scale, amplitude, ExhaustReason::Timeout));
            }

            amplitude = self.read_amplitude(sampler, channel, clock, cancel)?;
        }

        Err(self.exhausted(
            channel,
            state.scale,
            amplitude,
            ExhaustReason::IterationBudget,
        ))
    }

    fn exhausted(
        &self,
        channel: Channel,
        scale: f64,
        amplitude: f64,
        reason: ExhaustReason,
    ) -> SweepError {
        warn!("{channel}: autorange gave up ({reason}) at {scale} V/div, {amplitude} V");
        SweepError::RangeExhausted {
            channel,
            scale,
            amplitude,
            reason,
        }
    }
}
