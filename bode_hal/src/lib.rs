//! # Bode HAL Library
//!
//! Instrument bindings, result export and the `bode` binary.
//!
//! Drivers implement the `BenchDriver` trait defined in
//! `bode_common::driver` and hand out a generator / oscilloscope pair that
//! `bode_sweep` drives.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations
//! - [`export`] - CSV and JSON result sinks
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        bode (binary)                          │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐  │
//! │  │ bode.toml +  │──►│ SweepOrchestrator│──►│  ResultSink   │  │
//! │  │ CLI override │   │   (bode_sweep)   │   │  (CSV / JSON) │  │
//! │  └──────────────┘   └────────┬─────────┘   └───────────────┘  │
//! │                              │                                │
//! │                              ▼                                │
//! │  ┌──────────────────┐   ┌─────────────────────────────────┐   │
//! │  │ Driver Registry  │──►│ BenchDriver → InstrumentPair    │   │
//! │  └──────────────────┘   └─────────────────────────────────┘   │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;
pub mod export;

pub use crate::driver_registry::DriverRegistry;
pub use crate::export::{CsvSink, ExportError, JsonSink, ResultFormat, ResultSink, export_to_path};
