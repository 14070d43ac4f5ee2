//! Container Health Classifier CLI
//!
//! A command-line tool for classifying container metric samples with a
//! trained model bundle and for inspecting and evaluating bundles.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{evaluate, inspect, predict};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Container Health Classifier CLI
#[derive(Parser)]
#[command(name = "chc")]
#[command(author, version, about = "CLI for the Container Health Classifier", long_about = None)]
pub struct Cli {
    /// Model bundle path (can also be set via CHC_BUNDLE env var)
    #[arg(long, short, env = "CHC_BUNDLE", global = true)]
    pub bundle: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose logging on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify one metric record: prints 0 (working) or 1 (error)
    Predict {
        /// JSON file holding the record (reads stdin when omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// CPU usage, e.g. "12.5%"
        #[arg(long)]
        cpu_perc: Option<String>,

        /// Memory usage, e.g. "512MiB" or "512MiB / 1GiB"
        #[arg(long)]
        mem_usage: Option<String>,

        /// Memory limit, e.g. "1GiB"
        #[arg(long)]
        mem_limit: Option<String>,

        /// Memory usage as a percentage of the limit
        #[arg(long)]
        mem_perc: Option<String>,

        /// Number of processes
        #[arg(long)]
        pids: Option<String>,
    },

    /// Show bundle metadata, scaler parameters and feature importances
    Inspect,

    /// Score the bundle against a labeled CSV
    Evaluate {
        /// Labeled CSV in the collector's format
        #[arg(long, short)]
        data: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries results
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = config::Config::load()?;
    let bundle = config.resolve_bundle(cli.bundle.as_deref());
    let format = config.resolve_format(cli.format);

    match cli.command {
        Commands::Predict {
            input,
            cpu_perc,
            mem_usage,
            mem_limit,
            mem_perc,
            pids,
        } => {
            let flags = predict::MetricFlags {
                cpu_perc,
                mem_usage,
                mem_limit,
                mem_perc,
                pids,
            };
            predict::predict(&bundle, input, flags, format)?;
        }
        Commands::Inspect => {
            inspect::inspect(&bundle, format)?;
        }
        Commands::Evaluate { data } => {
            evaluate::evaluate(&bundle, &data, format)?;
        }
    }

    Ok(())
}
