//! Prelude module for common re-exports.
//!
//! ```rust
//! use bode_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{BenchConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Instruments ────────────────────────────────────────────────────
pub use crate::driver::{BenchDriver, DriverFactory, InstrumentPair};
pub use crate::instrument::{
    Amplitude, BandwidthMode, Channel, InstrumentError, ReadingBounds,
    ResponseSampler, StimulusController, Waveform,
};

// ─── Sweep ──────────────────────────────────────────────────────────
pub use crate::sweep::{
    ChannelMap, FrequencyPointResult, PhaseConvention, RangeConstraints, Spacing, SweepOptions,
};
