//! Frequency plan generation.
//!
//! A plan is the immutable, strictly increasing list of stimulus
//! frequencies for one sweep.

use crate::error::SweepError;
use bode_common::sweep::{Spacing, SweepOptions};

/// Ordered stimulus frequencies [Hz].
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyPlan {
    frequencies: Vec<f64>,
    spacing: Spacing,
}

impl FrequencyPlan {
    /// Generate `count` frequencies between `min_hz` and `max_hz` inclusive.
    ///
    /// Endpoints are exact: the first entry is `min_hz` and, for
    /// `count > 1`, the last is `max_hz`.
    ///
    /// # Errors
    /// `SweepError::InvalidRange` when `min_hz >= max_hz`, `count == 0`,
    /// a bound is not finite, `min_hz <= 0`, or the step is too small to
    /// keep the frequencies strictly increasing.
    pub fn generate(
        min_hz: f64,
        max_hz: f64,
        count: usize,
        spacing: Spacing,
    ) -> Result<Self, SweepError> {
        if !(min_hz.is_finite() && max_hz.is_finite()) {
            return Err(SweepError::InvalidRange(format!(
                "bounds must be finite (min={min_hz}, max={max_hz})"
            )));
        }
        if min_hz >= max_hz {
            return Err(SweepError::InvalidRange(format!(
                "min frequency ({min_hz} Hz) must be below max frequency ({max_hz} Hz)"
            )));
        }
        if count == 0 {
            return Err(SweepError::InvalidRange(
                "point count must be positive".to_string(),
            ));
        }
        if min_hz <= 0.0 {
            // Settle time is a multiple of the period, so 0 Hz is unusable in either spacing.
            let what = match spacing {
                Spacing::Logarithmic => "logarithmic spacing requires",
                Spacing::Linear => "stimulus frequencies require",
            };
            return Err(SweepError::InvalidRange(format!(
                "{what} min frequency > 0 (got {min_hz} Hz)"
            )));
        }

        let frequencies = match spacing {
            Spacing::Linear => interpolate(min_hz, max_hz, count),
            Spacing::Logarithmic => {
                let mut f: Vec<f64> = interpolate(min_hz.log10(), max_hz.log10(), count)
                    .into_iter()
                    .map(|exp| 10f64.powf(exp))
                    .collect();
                pin_endpoints(&mut f, min_hz, max_hz);
                f
            }
        };

        // Steps below the f64 resolution of the bounds collapse neighbours.
        if !frequencies.windows(2).all(|w| w[0] < w[1]) {
            return Err(SweepError::InvalidRange(format!(
                "{count} points are too many for the range {min_hz} Hz .. {max_hz} Hz"
            )));
        }

        Ok(Self {
            frequencies,
            spacing,
        })
    }

    /// Generate the plan described by sweep options.
    pub fn from_options(options: &SweepOptions) -> Result<Self, SweepError> {
        Self::generate(options.min_hz, options.max_hz, options.points, options.spacing)
    }

    /// Number of points (always at least one).
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Never true for a generated plan.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Spacing the plan was generated with.
    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// Frequencies in sweep order.
    pub fn as_slice(&self) -> &[f64] {
        &self.frequencies
    }

    /// Iterate frequencies in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.frequencies.iter().copied()
    }

    /// Lowest frequency.
    pub fn first(&self) -> f64 {
        self.frequencies[0]
    }

    /// Highest frequency.
    pub fn last(&self) -> f64 {
        self.frequencies[self.frequencies.len() - 1]
    }
}

/// `count` evenly spaced values from `start` to `stop`.
fn interpolate(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    let step = (stop - start) / (count - 1) as f64;
    let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
    pin_endpoints(&mut values, start, stop);
    values
}

fn pin_endpoints(values: &mut [f64], start: f64, stop: f64) {
    if let Some(first) = values.first_mut() {
        *first = start;
    }
    if values.len() > 1 {
        if let Some(last) = values.last_mut() {
            *last = stop;
        }
    }
}
