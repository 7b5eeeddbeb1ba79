//! spectrumctl - control spectrum workers from the shell
//!
//! Talks to a running `spectrumd` through its control files and signals.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use spectrum_control::{ClientProxy, ControlFiles};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "spectrumctl")]
#[command(author, version, about = "Spectrum worker control")]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the workers' control files
    #[arg(short, long, env = "SPECTRUM_RUN_DIR")]
    run_dir: Option<PathBuf>,

    /// Worker to address
    #[arg(short, long, env = "SPECTRUM_WORKER")]
    worker: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "SPECTRUMCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the worker's PID and latest status
    Status,

    /// Run a configuration
    Start {
        /// Configuration ID
        config_id: String,
    },

    /// Stop the running configuration; the worker stays up
    Stop,

    /// Ask the worker to exit
    Terminate {
        /// Leave the pending configuration for the next worker
        #[arg(long)]
        keep_config: bool,
    },

    /// Print the worker's PID
    Pid,

    /// List the configurable values of a device type
    Caps {
        /// Device type (defaults to the worker name)
        device: Option<String>,
    },

    /// Follow sweeps as the worker publishes them
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);
    match run(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, ctx: &OutputContext) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };
    let merged =
        config.merge_with_args(cli.run_dir.as_deref(), cli.worker.as_deref(), cli.no_color);
    if merged.no_color {
        colored::control::set_override(false);
    }

    debug!(run_dir = %merged.run_dir.display(), worker = %merged.worker, "Resolved worker");
    let mut proxy = ClientProxy::new(ControlFiles::new(&merged.run_dir, &merged.worker));

    match &cli.command {
        Commands::Status => commands::status(&mut proxy, ctx),
        Commands::Start { config_id } => commands::start(&mut proxy, config_id, ctx),
        Commands::Stop => commands::stop(&mut proxy, ctx),
        Commands::Terminate { keep_config } => commands::terminate(&mut proxy, *keep_config, ctx),
        Commands::Pid => commands::pid(&mut proxy, ctx),
        Commands::Caps { device } => {
            let device = device.as_deref().unwrap_or(&merged.worker);
            commands::caps(&config.drivers, device, ctx)
        }
        Commands::Watch { interval_ms } => commands::watch(&mut proxy, *interval_ms, ctx),
    }
}
