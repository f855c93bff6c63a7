//! # Bode Sweep Binary
//!
//! Measures the frequency response of a device under test with a signal
//! generator and an oscilloscope.
//!
//! # Usage
//!
//! ```bash
//! # 50 log-spaced points from 10 Hz to 100 kHz on the simulated bench
//! bode 10 100000
//!
//! # 200 points with phase, normalized, written as CSV
//! bode 10 100000 200 --phase --normalize --output result.csv
//!
//! # Linear spacing, 2 Vpp stimulus, extra 100 ms per point, JSON output
//! bode 1000 20000 40 --linear --awg-voltage 2 --step-time 100 --output result.json
//!
//! # Oscilloscope set up by hand, debug logging
//! bode 100 1000 --use-manual-settings -v
//! ```

use bode_common::consts::{DEFAULT_CONFIG_FILE, DEFAULT_DRIVER};
use bode_common::prelude::*;
use bode_hal::{CsvSink, DriverRegistry, ResultSink, export_to_path};
use bode_sweep::{CancelToken, FrequencyPlan, SweepOrchestrator, SystemClock};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Bode - automated frequency response measurement
#[derive(Parser, Debug)]
#[command(name = "bode")]
#[command(version)]
#[command(about = "Frequency response sweep with oscilloscope autorange")]
#[command(long_about = None)]
struct Args {
    /// Lowest frequency [Hz]
    #[arg(value_name = "MIN")]
    min: Option<f64>,

    /// Highest frequency [Hz]
    #[arg(value_name = "MAX")]
    max: Option<f64>,

    /// Number of frequency points
    #[arg(value_name = "COUNT")]
    count: Option<usize>,

    /// Bench configuration file (defaults to ./bode.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bench driver
    #[arg(short, long, default_value = DEFAULT_DRIVER)]
    driver: String,

    /// Space frequencies linearly instead of logarithmically
    #[arg(long)]
    linear: bool,

    /// Generator amplitude [Vpp]
    #[arg(long, value_name = "VOLTS")]
    awg_voltage: Option<f64>,

    /// Extra delay after each frequency change [ms]
    #[arg(long, value_name = "MS")]
    step_time: Option<u64>,

    /// Measure phase
    #[arg(long)]
    phase: bool,

    /// Leave vertical scale and timebase as set on the oscilloscope
    #[arg(long)]
    use_manual_settings: bool,

    /// Record response / reference amplitude
    #[arg(long)]
    normalize: bool,

    /// Result file; `.json` writes JSON, anything else CSV. Stdout when absent.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Sweep failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref());
    let file_level = loaded
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, file_level);

    let mut config = loaded?;
    info!(
        "{} v{} starting ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    apply_overrides(&args, &mut config.sweep);
    config.validate()?;
    let plan = FrequencyPlan::from_options(&config.sweep)?;

    let registry = DriverRegistry::with_builtin_drivers();
    let mut driver = registry.create_driver(&args.driver)?;
    info!("Using driver {} v{}", driver.name(), driver.version());
    let InstrumentPair {
        mut stimulus,
        mut sampler,
    } = driver.connect(&config)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Received interrupt, stopping sweep");
        handler_token.cancel();
    })?;

    let mut clock = SystemClock::new();
    let report = {
        let mut orchestrator = SweepOrchestrator::new(
            stimulus.as_mut(),
            sampler.as_mut(),
            &mut clock,
            config.range.clone(),
            cancel,
        );
        orchestrator.run(&plan, &config.channels, &config.sweep)
    };

    drop(stimulus);
    drop(sampler);
    if let Err(e) = driver.disconnect() {
        warn!("Driver disconnect failed: {}", e);
    }

    if let Err(e) = write_results(args.output.as_deref(), &config.sweep, &report.points) {
        error!("{}", e);
        if report.is_complete() {
            return Err(e.into());
        }
    }

    report.outcome?;
    info!("Bode sweep complete");
    Ok(())
}

/// Load the bench file; a missing default file means built-in defaults.
fn load_config(path: Option<&Path>) -> Result<BenchConfig, ConfigError> {
    match path {
        Some(path) => BenchConfig::load(path),
        None => match BenchConfig::load(Path::new(DEFAULT_CONFIG_FILE)) {
            Err(ConfigError::FileNotFound) => Ok(BenchConfig::default()),
            other => other,
        },
    }
}

/// CLI arguments take precedence over the `[sweep]` section.
fn apply_overrides(args: &Args, sweep: &mut SweepOptions) {
    if let Some(min) = args.min {
        sweep.min_hz = min;
    }
    if let Some(max) = args.max {
        sweep.max_hz = max;
    }
    if let Some(count) = args.count {
        sweep.points = count;
    }
    if args.linear {
        sweep.spacing = Spacing::Linear;
    }
    if let Some(volts) = args.awg_voltage {
        sweep.stimulus_amplitude_v = volts;
    }
    if let Some(ms) = args.step_time {
        sweep.extra_delay_ms = ms;
    }
    if args.phase {
        sweep.measure_phase = true;
    }
    if args.use_manual_settings {
        sweep.auto_range = false;
    }
    if args.normalize {
        sweep.normalize = true;
    }
}

fn write_results(
    output: Option<&Path>,
    sweep: &SweepOptions,
    points: &[FrequencyPointResult],
) -> Result<(), bode_hal::ExportError> {
    match output {
        Some(path) => export_to_path(path, points, sweep.measure_phase).map(|_| ()),
        None => CsvSink::new(std::io::stdout().lock(), sweep.measure_phase).write_points(points),
    }
}

/// Setup tracing subscriber based on CLI arguments and the config file.
fn setup_tracing(args: &Args, file_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        file_level.into()
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
