//! Bench driver trait.
//!
//! A driver knows how to reach one generator/oscilloscope pair and hands
//! both out as capability objects. The sweep never sees transport details.

use crate::config::BenchConfig;
use crate::instrument::{InstrumentError, ResponseSampler, StimulusController};

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn BenchDriver>;

/// The two instruments a sweep drives, owned for the duration of one run.
pub struct InstrumentPair {
    /// Signal generator
    pub stimulus: Box<dyn StimulusController>,
    /// Oscilloscope
    pub sampler: Box<dyn ResponseSampler>,
}

/// Trait defining the interface for bench drivers.
///
/// # Lifecycle
///
/// 1. `connect()` - Called once before the sweep, returns the instrument pair
/// 2. The sweep runs against the returned pair
/// 3. `disconnect()` - Called after the pair has been dropped
pub trait BenchDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Open both instruments.
    ///
    /// Driver-specific settings live in `config.driver_config[name]`.
    ///
    /// # Errors
    /// Return `InstrumentError::InitFailed` if either instrument cannot be reached.
    fn connect(&mut self, config: &BenchConfig) -> Result<InstrumentPair, InstrumentError>;

    /// Release driver resources.
    /// Default: no-op
    fn disconnect(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }
}
