//! Instrument and timing defaults for the Bode sweep workspace.
//!
//! Single source of truth for numeric defaults used by configuration
//! structs and the simulation driver.

/// Reading an oscilloscope returns when it cannot compute a measurement.
pub const INSTRUMENT_INVALID_READING: f64 = 9.9e37;

/// Largest phase magnitude in degrees accepted as a real reading.
pub const PHASE_LIMIT_DEG: f64 = 360.0;

/// Vertical divisions on the oscilloscope screen.
pub const DEFAULT_VERTICAL_DIVISIONS: f64 = 8.0;

/// Signal periods to wait after a frequency or scale change.
pub const DEFAULT_SETTLE_CYCLES: f64 = 10.0;

/// Horizontal divisions one signal period should span.
pub const DEFAULT_TIMEBASE_DIVISIONS: f64 = 3.0;

/// Wait before the first point of a sweep, in milliseconds.
pub const DEFAULT_INITIAL_SETTLE_MS: u64 = 50;

/// Instrument settle after a vertical scale change, in milliseconds.
pub const DEFAULT_INSTRUMENT_SETTLE_MS: u64 = 200;

/// Wait before a phase read, in milliseconds.
pub const DEFAULT_PHASE_SETTLE_MS: u64 = 500;

/// Longest single settle wait a sweep accepts, in seconds (one day).
pub const MAX_SETTLE_S: f64 = 86_400.0;

/// Initial vertical scale is the stimulus amplitude divided by this.
pub const INITIAL_SCALE_DIVISOR: f64 = 2.5;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "bode.toml";

/// Driver used when none is requested.
pub const DEFAULT_DRIVER: &str = "simulation";
