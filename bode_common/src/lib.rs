//! Bode Common Library
//!
//! Shared vocabulary for every crate in the Bode sweep workspace: the
//! instrument capability traits, measurement and result types, sweep and
//! autorange configuration, and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`instrument`] - `StimulusController` / `ResponseSampler` traits and reading types
//! - [`driver`] - `BenchDriver` trait used to connect a pair of instruments
//! - [`sweep`] - Sweep options, channel map, range constraints, point results
//! - [`config`] - Configuration loading traits and the bench configuration file
//! - [`consts`] - Instrument and timing defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use bode_common::prelude::*;
//!
//! let options = SweepOptions::default();
//! assert!(options.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod driver;
pub mod instrument;
pub mod prelude;
pub mod sweep;
