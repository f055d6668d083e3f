//! EC-Kernel CLI: potentiostat control through the EC-Lab OEM library.
//!
//! This is the main entry point for the EC-Kernel tool.

mod config;
mod orchestrator;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lib_eclib_ffi::{default_library_name, EclBinder, EclDevice, EclLibrary};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ec-kernel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the EClib shared library (defaults to the platform name)
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Output format for experiment data
    #[arg(short, long, default_value = "csv")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show library and instrument information
    Info {
        /// Instrument address (IP or USB designator)
        address: String,

        /// Connection timeout (s)
        #[arg(short, long, default_value = "5")]
        timeout: u8,
    },

    /// List per-channel board information
    Channels {
        /// Instrument address (IP or USB designator)
        address: String,

        /// Connection timeout (s)
        #[arg(short, long, default_value = "5")]
        timeout: u8,
    },

    /// Run an experiment from a configuration file
    Run {
        /// Path to the experiment configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Stop a running channel
    Stop {
        /// Instrument address (IP or USB designator)
        address: String,

        /// Channel to stop (0-based)
        #[arg(short, long, default_value = "0")]
        channel: u8,

        /// Connection timeout (s)
        #[arg(short, long, default_value = "5")]
        timeout: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info { address, timeout } => {
            show_info(cli.library.as_deref(), &address, timeout)?;
        }
        Commands::Channels { address, timeout } => {
            show_channels(cli.library.as_deref(), &address, timeout)?;
        }
        Commands::Run { config, output } => {
            run_experiment(cli.library.as_deref(), &config, &output, cli.format)?;
        }
        Commands::Stop {
            address,
            channel,
            timeout,
        } => {
            stop_channel(cli.library.as_deref(), &address, channel, timeout)?;
        }
    }

    Ok(())
}

/// Load the EClib library, preferring the command-line path.
fn open_library(library: Option<&std::path::Path>) -> Result<(EclBinder, Arc<EclLibrary>)> {
    let mut binder = EclBinder::new();
    let handle = match library {
        Some(path) => binder.initialize(path),
        None => binder.initialize(default_library_name()),
    }
    .context("Failed to load the EClib library")?;
    Ok((binder, handle))
}

fn show_info(library: Option<&std::path::Path>, address: &str, timeout: u8) -> Result<()> {
    let (mut binder, handle) = open_library(library)?;

    println!("EClib: {}", handle.path);
    println!("Version: {}", handle.lib_version()?);

    let device = EclDevice::connect(&handle, address, timeout)
        .with_context(|| format!("Failed to connect to {address}"))?;

    println!("\nDevice: {}", device.info());
    println!("  RAM: {} MB", device.info().ram_size);
    println!("  Slots: {}", device.info().number_of_slots);

    let plugged = device.plugged_channels()?;
    println!(
        "  Plugged channels: {}",
        plugged
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    device.disconnect()?;
    binder.teardown();
    Ok(())
}

fn show_channels(library: Option<&std::path::Path>, address: &str, timeout: u8) -> Result<()> {
    let (mut binder, handle) = open_library(library)?;

    let device = EclDevice::connect(&handle, address, timeout)
        .with_context(|| format!("Failed to connect to {address}"))?;
    println!("Device: {}", device.info());

    for channel in device.plugged_channels()? {
        let info = device.channel_info(channel)?;
        println!("\nChannel {}:", channel);
        println!("  Board:     v{} (s/n {})", info.board_version, info.board_serial_number);
        println!("  Firmware:  {:?} v{}", info.firmware_code, info.firmware_version);
        println!("  State:     {}", info.state);
        println!(
            "  I range:   {} .. {}",
            info.min_current_range.label(),
            info.max_current_range.label()
        );
        println!("  Memory:    {}/{} bytes", info.mem_filled, info.mem_size);
        if info.loaded_techniques > 0 {
            println!("  Loaded techniques: {}", info.loaded_techniques);
        }
    }

    device.disconnect()?;
    binder.teardown();
    Ok(())
}

fn run_experiment(
    library: Option<&std::path::Path>,
    config_path: &PathBuf,
    output_dir: &PathBuf,
    format: OutputFormat,
) -> Result<()> {
    tracing::info!("Loading configuration from {:?}", config_path);

    let mut config = config::load_config(config_path)?;
    // The command-line library path wins over the configured one.
    if let Some(path) = library {
        config.library = Some(path.to_path_buf());
    }

    let orchestrator = orchestrator::Orchestrator::new(config)?;
    let results = orchestrator.run()?;

    std::fs::create_dir_all(output_dir)?;
    output::write_results(&results, output_dir, format)?;
    output::print_results(&results);

    tracing::info!("Results written to {:?}", output_dir);
    Ok(())
}

fn stop_channel(
    library: Option<&std::path::Path>,
    address: &str,
    channel: u8,
    timeout: u8,
) -> Result<()> {
    let (mut binder, handle) = open_library(library)?;

    let device = EclDevice::connect(&handle, address, timeout)
        .with_context(|| format!("Failed to connect to {address}"))?;

    let info = device.channel_info(channel)?;
    if !info.state.is_running() {
        println!("Channel {channel} is not running (state: {})", info.state);
    } else {
        device.stop_channel(channel)?;
        println!("Channel {channel} stopped");
    }

    device.disconnect()?;
    binder.teardown();
    Ok(())
}
