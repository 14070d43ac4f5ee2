//! Health Trainer - offline training job for the container health classifier
//!
//! Reads the collector's labeled CSV, trains the scaler and random forest,
//! prints the held-out evaluation and writes a model bundle for `chc`.

use anyhow::{Context, Result};
use clap::Parser;
use health_lib::{
    observability::{ClassifierMetrics, StructuredLogger},
    CsvRecordSource, TrainingOutcome, TrainingPipeline,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{ConfigOverrides, TrainerConfig};

const TRAINER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Train the container health classifier
#[derive(Parser, Debug)]
#[command(name = "health-trainer")]
#[command(author, version, about = "Train the container health classifier", long_about = None)]
struct Args {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, short, env = "HEALTH_TRAINER_CONFIG")]
    config: Option<PathBuf>,

    /// Labeled CSV produced by the collector
    #[arg(long)]
    data: Option<PathBuf>,

    /// Output path for the model bundle
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Write Prometheus metrics to this file after training
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Number of trees in the forest
    #[arg(long)]
    n_trees: Option<usize>,

    /// Seed for bootstrap draws and feature subsampling
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of samples held out for evaluation
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Fail on labels other than `working` or `error`
    #[arg(long)]
    strict_labels: bool,

    /// Build trees one at a time instead of on the thread pool
    #[arg(long)]
    sequential: bool,

    /// Print the training summary as JSON instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_path: self.data.clone(),
            bundle_path: self.bundle.clone(),
            metrics_path: self.metrics_out.clone(),
            n_trees: self.n_trees,
            seed: self.seed,
            test_fraction: self.test_fraction,
            strict_labels: self.strict_labels,
            sequential: self.sequential,
        }
    }
}

/// Machine-readable result of a run
#[derive(Serialize)]
struct TrainingSummary<'a> {
    bundle_path: String,
    model_version: &'a str,
    checksum: &'a str,
    train_size: usize,
    test_size: usize,
    dropped: BTreeMap<String, usize>,
    report: &'a health_lib::EvaluationReport,
}

fn main() -> Result<()> {
    // Logs go to stderr as JSON so stdout carries only the report
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!(version = TRAINER_VERSION, "Starting health-trainer");

    let config = TrainerConfig::load(args.config.as_deref(), &args.overrides())?;
    info!(
        data_path = %config.data_path.display(),
        bundle_path = %config.bundle_path.display(),
        n_trees = config.n_trees,
        seed = config.seed,
        "Trainer configured"
    );

    let logger = StructuredLogger::new("trainer");
    let pipeline = TrainingPipeline::new(config.pipeline_config())?;
    let outcome = pipeline.run(&CsvRecordSource::new(&config.data_path))?;

    outcome.bundle.save(&config.bundle_path)?;
    logger.log_bundle_saved(
        &config.bundle_path.display().to_string(),
        outcome.bundle.model_version(),
        outcome.bundle.checksum(),
    );

    print_summary(&outcome, &config, args.json)?;

    if let Some(path) = &config.metrics_path {
        let text = ClassifierMetrics::new().render()?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!(path = %path.display(), "Metrics written");
    }

    logger.log_shutdown("training complete");
    Ok(())
}

fn print_summary(outcome: &TrainingOutcome, config: &TrainerConfig, json: bool) -> Result<()> {
    if json {
        let summary = TrainingSummary {
            bundle_path: config.bundle_path.display().to_string(),
            model_version: outcome.bundle.model_version(),
            checksum: outcome.bundle.checksum(),
            train_size: outcome.train_size,
            test_size: outcome.test_size,
            dropped: outcome.drops.by_name(),
            report: &outcome.report,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "Trained {} on {} samples ({} held out)",
        outcome.bundle.model_version(),
        outcome.train_size,
        outcome.test_size
    );
    if outcome.drops.is_empty() {
        println!("Dropped samples: none");
    } else {
        println!("Dropped samples: {}", outcome.drops.total());
        for (reason, count) in outcome.drops.iter() {
            println!("  {:<24} {}", reason.name(), count);
        }
    }
    println!();
    print!("{}", outcome.report);
    println!();
    println!("Bundle written to {}", config.bundle_path.display());
    Ok(())
}
