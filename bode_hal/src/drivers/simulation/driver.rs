//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements `BenchDriver` by building one
//! simulated bench and handing out a generator and an oscilloscope that
//! both act on it.

use super::bench::{BenchState, SharedBench, SimulationConfig};
use super::generator::SimulatedGenerator;
use super::scope::SimulatedScope;
use bode_common::config::BenchConfig;
use bode_common::driver::{BenchDriver, InstrumentPair};
use bode_common::instrument::InstrumentError;
use tracing::{debug, info};

/// Simulation driver implementing the BenchDriver trait.
pub struct SimulationDriver {
    name: &'static str,
    version: &'static str,
    /// Bench of the current connection
    bench: Option<SharedBench>,
}

impl SimulationDriver {
    /// Create a new simulation driver instance.
    pub fn new() -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            bench: None,
        }
    }

    /// Parse the driver's configuration section; a missing section means defaults.
    pub fn parse_config(config: &BenchConfig) -> Result<SimulationConfig, InstrumentError> {
        let sim: SimulationConfig = match config.driver_section("simulation") {
            Some(section) => section.clone().try_into().map_err(|e| {
                InstrumentError::InitFailed(format!("invalid [driver_config.simulation]: {e}"))
            })?,
            None => {
                debug!("No [driver_config.simulation] section, using defaults");
                SimulationConfig::default()
            }
        };
        sim.validate().map_err(InstrumentError::InitFailed)?;
        Ok(sim)
    }

    /// Bench of the current connection, for inspection.
    pub fn bench(&self) -> Option<&SharedBench> {
        self.bench.as_ref()
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn connect(&mut self, config: &BenchConfig) -> Result<InstrumentPair, InstrumentError> {
        let sim = Self::parse_config(config)?;
        info!(
            "Simulated bench: DUT {:?}, generator up to {} Hz, {}-bit scope with {} inputs",
            sim.dut, sim.generator_max_hz, sim.adc_bits, sim.scope_channels
        );

        let bench = BenchState::shared(sim);
        self.bench = Some(bench.clone());

        Ok(InstrumentPair {
            stimulus: Box::new(SimulatedGenerator::new(bench.clone())),
            sampler: Box::new(SimulatedScope::new(bench)),
        })
    }

    fn disconnect(&mut self) -> Result<(), InstrumentError> {
        if let Some(bench) = self.bench.take() {
            info!("Simulated bench closed after {} commands", bench.lock().commands);
        }
        Ok(())
    }
}
