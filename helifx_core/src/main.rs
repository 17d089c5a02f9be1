//! # HeliFX Core Binary
//!
//! Reads receiver channels, drives the turret servos and runs the gun
//! effects until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config on real hardware
//! helifx
//!
//! # Simulated GPIO and outputs
//! helifx --config helifx.toml --simulate
//!
//! # Override the output driver, verbose JSON logs
//! helifx -c helifx.toml --driver gpio -v --json
//! ```

use clap::Parser;
use helifx_common::config::ConfigLoader;
use helifx_common::consts::DEFAULT_CONFIG_PATH;
use helifx_common::fx::config::HeliFxConfig;
use helifx_core::HeliFxCore;
use helifx_core::clock::MonotonicClock;
use helifx_core::driver_registry::DriverRegistry;
use helifx_core::error::CoreError;
use helifx_core::gpio::simulation::SimulatedGpio;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// HeliFX Core - RC model effects controller
#[derive(Parser, Debug)]
#[command(name = "helifx")]
#[command(version)]
#[command(about = "PWM capture, servo motion profiling and gun effects for RC models")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use simulated GPIO edges and the simulation output driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Output driver override (e.g. "gpio", "simulation")
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let mut config = match HeliFxConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    setup_tracing(&args, &config);

    if let Some(driver) = &args.driver {
        config.gpio.output_driver = driver.clone();
    }

    if let Err(e) = run(args, config) {
        error!("HeliFX startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args, mut config: HeliFxConfig) -> Result<(), CoreError> {
    info!("HeliFX Core v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut core = if args.simulate {
        info!("Simulation mode enabled");
        config.gpio.output_driver = "simulation".to_string();
        HeliFxCore::new(
            config,
            Arc::new(SimulatedGpio::new()),
            Arc::new(MonotonicClock),
            DriverRegistry::with_builtin(),
        )?
    } else {
        HeliFxCore::with_hardware(config)?
    };

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|e| CoreError::Signal(e.to_string()))?;

    if let Err(e) = core.init() {
        core.shutdown();
        return Err(e);
    }

    if let Err(e) = core.run() {
        error!("Run loop error: {}", e);
    }

    core.shutdown();
    info!("HeliFX Core shutdown complete");
    Ok(())
}

/// Setup tracing subscriber from the config log level and CLI flags.
fn setup_tracing(args: &Args, config: &HeliFxConfig) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.shared.log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
