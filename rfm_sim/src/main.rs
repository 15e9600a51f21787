//! # RFM Simulator Binary
//!
//! Runs the matching-network simulator against the wall clock until
//! interrupted or until `--duration-ms` elapses.
//!
//! # Usage
//!
//! ```bash
//! # Defaults, auto-matching started immediately
//! rfm_sim --config config/rfm.toml --ams
//!
//! # Stream every event as JSON lines on stdout
//! rfm_sim --ams --events --duration-ms 5000
//!
//! # Verbose logging
//! rfm_sim -v
//! ```

use clap::Parser;
use rfm::config::{ConfigError, ConfigLoader, LogLevel};
use rfm::consts::DEFAULT_CONFIG_PATH;
use rfm::matcher::config::SimulatorConfig;
use rfm::matcher::sink::ResponseSink;
use rfm_sim::core::SimCore;
use rfm_sim::sink::{JsonLineSink, TracingSink};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// RFM Simulator - RF matching network emulator with auto-matching loop
#[derive(Parser, Debug)]
#[command(name = "rfm_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "RF impedance-matching network simulator")]
#[command(long_about = None)]
struct Args {
    /// Path to simulator configuration file (rfm.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Start the auto-matching loop at startup
    #[arg(long)]
    ams: bool,

    /// AMS timeout in milliseconds (0 = run until stopped)
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Stop the simulator after this many milliseconds
    #[arg(long, value_name = "MS")]
    duration_ms: Option<u64>,

    /// Write events as JSON lines on stdout instead of logging them
    #[arg(long)]
    events: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Simulator failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = SimulatorConfig::load(&args.config);
    let log_level = match &loaded {
        Ok(config) => config.shared.log_level,
        Err(_) => LogLevel::default(),
    };
    setup_tracing(&args, log_level);

    info!("RFM Simulator v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            info!("Loaded configuration from {:?}", args.config);
            config
        }
        Err(ConfigError::FileNotFound) => {
            warn!("No configuration at {:?}, using defaults", args.config);
            SimulatorConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    if args.ams {
        config.ams.auto_start = true;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.ams.timeout_ms = timeout_ms;
    }

    let sink: Box<dyn ResponseSink> = if args.events {
        Box::new(JsonLineSink::new(std::io::stdout()))
    } else {
        Box::new(TracingSink)
    };

    let mut core = SimCore::new(config, sink)?;

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if let Err(e) = core.run(args.duration_ms.map(Duration::from_millis)) {
        error!("Scheduler loop error: {}", e);
    }

    core.shutdown()?;

    let stats = core.stats();
    info!(
        "RFM Simulator shutdown complete: {} cycles, avg={}us, max={}us, overruns={}",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        stats.overruns
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and configured level.
///
/// Logs go to stderr so `--events` output on stdout stays parseable.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

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
