//! Hedged straddle engine - main entry point
//!
//! This binary provides two subcommands:
//! - simulate: Replay a price CSV through the paper venue
//! - validate: Check a configuration file and print the stop-loss table

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "straddle-engine")]
#[command(about = "Hedged short-straddle order-state engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the log file as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay recorded prices through the strategy and a paper venue
    Simulate {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/nifty_straddle.json")]
        config: String,

        /// CSV of datetime,symbol,price rows
        #[arg(short, long, default_value = "data/sample_session.csv")]
        prices: String,

        /// Lots per leg (overrides config file)
        #[arg(long)]
        lots: Option<u32>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/nifty_straddle.json")]
        config: String,
    },
}

fn setup_logging(verbose: bool, json: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same fields, no ANSI colors
    let file_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Simulate { .. } => "simulate",
        Commands::Validate { .. } => "validate",
    };

    setup_logging(cli.verbose, cli.json_logs, command_name)?;

    match cli.command {
        Commands::Simulate {
            config,
            prices,
            lots,
        } => commands::simulate::run(config, prices, lots),

        Commands::Validate { config } => commands::validate::run(config),
    }
}
