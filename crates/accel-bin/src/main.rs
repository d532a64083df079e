//! `acceld`: H3LIS331DL shock logger.
//!
//! One binary, two long-running roles plus an offline tool:
//!
//! ```bash
//! acceld --config /etc/acceld.toml collect --bus 0   # one process per I2C bus
//! acceld --config /etc/acceld.toml process           # one event processor
//! acceld inspect /dev/shm/accel_raw/accel_bus0_0x19_1770773050.dat --detect
//! ```
//!
//! The collector and processor run until SIGINT or SIGTERM. Exit status is
//! non-zero only when configuration or startup fails.

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod inspect;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use accel_core::{AppConfig, StopFlag};
use accel_processor::{DetectorConfig, ProcessorSupervisor};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::info;

const PROCESSOR_LOG_FILE: &str = "process_accel.log";

#[derive(Parser)]
#[command(name = "acceld", version)]
#[command(about = "High-g accelerometer collector and event processor", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted; ACCEL_*
    /// environment variables override both.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every configured sensor on one I2C bus into raw files
    Collect {
        /// I2C bus number (overrides collector.bus)
        #[arg(long)]
        bus: Option<u8>,
    },

    /// Turn sealed raw files into event files
    Process,

    /// Print a raw file's header and summary without touching it
    Inspect {
        /// Raw `.dat` file
        file: PathBuf,

        /// Also run event detection and list the windows
        #[arg(long)]
        detect: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Collect { bus } => {
            if let Some(bus) = bus {
                config.collector.bus = bus;
            }
            let log_name = format!("accel_bus{}.log", config.collector.bus);
            let guard = logging::init(&config.logging, &log_name)?;
            announce(&guard);
            let stop = install_stop_handler()?;
            run_collector(&config, stop)
        }
        Commands::Process => {
            let guard = logging::init(&config.logging, PROCESSOR_LOG_FILE)?;
            announce(&guard);
            let stop = install_stop_handler()?;
            let stats = ProcessorSupervisor::new(&config, stop).run()?;
            info!(?stats, "Exiting");
            Ok(())
        }
        Commands::Inspect { file, detect } => {
            let detector = detect.then(|| DetectorConfig::from(&config.detector));
            inspect::run(&file, detector.as_ref())
        }
    }
}

fn announce(guard: &logging::LoggingGuard) {
    info!(version = env!("CARGO_PKG_VERSION"), "acceld starting");
    if let Some(path) = guard.log_file() {
        info!(path = %path.display(), "Also logging to file");
    }
}

/// Stop flag set by SIGINT and SIGTERM.
fn install_stop_handler() -> Result<StopFlag> {
    let stop = StopFlag::new();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(stop.as_arc()))
            .with_context(|| format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(stop)
}

#[cfg(target_os = "linux")]
fn run_collector(config: &AppConfig, stop: StopFlag) -> Result<()> {
    use accel_collector::CollectorSupervisor;
    use accel_driver_h3lis331::LinuxBusProvider;

    let provider = LinuxBusProvider::new(config.collector.bus, config.collector.i2c_timeout);
    let stats = CollectorSupervisor::new(config, provider, stop).run()?;
    info!(?stats, "Exiting");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run_collector(_config: &AppConfig, _stop: StopFlag) -> Result<()> {
    anyhow::bail!("the collector needs Linux i2c-dev")
}
