//! Simulation driver module.
//!
//! A software bench for development and testing without instruments:
//! signal generator, first-order DUT and oscilloscope share one state.

mod bench;
mod driver;
mod generator;
mod scope;

pub use bench::{
    BenchState, DutModel, GeneratorOutput, ScopeInput, SharedBench, SimulationConfig, Trace,
};
pub use driver::SimulationDriver;
pub use generator::SimulatedGenerator;
pub use scope::SimulatedScope;

use bode_common::driver::BenchDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn BenchDriver> {
    Box::new(SimulationDriver::new())
}
