//! Trainer configuration
//!
//! Layered with the `config` crate: an optional config file, then
//! `TRAINER_*` environment variables, then command-line overrides.

use anyhow::{Context, Result};
use health_lib::classifier::ForestConfig;
use health_lib::pipeline::{PipelineConfig, SplitConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable prefix (`TRAINER_DATA_PATH`, `TRAINER_N_TREES`, ...)
const ENV_PREFIX: &str = "TRAINER";

/// Trainer configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Labeled CSV written by the collector
    pub data_path: PathBuf,

    /// Where the model bundle is written
    pub bundle_path: PathBuf,

    /// Optional file receiving the Prometheus text exposition after the run
    pub metrics_path: Option<PathBuf>,

    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
    pub parallel: bool,

    pub test_fraction: f64,
    pub split_seed: u64,
    pub stratify: bool,

    /// Abort on labels other than `working`/`error`
    pub strict_labels: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        let forest = ForestConfig::default();
        let split = SplitConfig::default();
        Self {
            data_path: PathBuf::from("docker_stats.csv"),
            bundle_path: PathBuf::from("health_model.json"),
            metrics_path: None,
            n_trees: forest.n_trees,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            min_samples_leaf: forest.min_samples_leaf,
            max_features: forest.max_features,
            bootstrap: forest.bootstrap,
            seed: forest.seed,
            parallel: forest.parallel,
            test_fraction: split.test_fraction,
            split_seed: split.seed,
            stratify: split.stratify,
            strict_labels: false,
        }
    }
}

/// Values given on the command line; `None` leaves the layered value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_path: Option<PathBuf>,
    pub bundle_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub n_trees: Option<usize>,
    pub seed: Option<u64>,
    pub test_fraction: Option<f64>,
    pub strict_labels: bool,
    pub sequential: bool,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut TrainerConfig) {
        if let Some(path) = &self.data_path {
            config.data_path = path.clone();
        }
        if let Some(path) = &self.bundle_path {
            config.bundle_path = path.clone();
        }
        if let Some(path) = &self.metrics_path {
            config.metrics_path = Some(path.clone());
        }
        if let Some(n) = self.n_trees {
            config.n_trees = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
        if self.strict_labels {
            config.strict_labels = true;
        }
        if self.sequential {
            config.parallel = false;
        }
    }
}

impl TrainerConfig {
    /// Load configuration from an optional file, the environment and overrides
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to assemble trainer configuration")?;

        let mut config: TrainerConfig = settings
            .try_deserialize()
            .context("Invalid trainer configuration")?;
        overrides.apply(&mut config);
        Ok(config)
    }

    /// Library-side settings for one training run
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            forest: ForestConfig {
                n_trees: self.n_trees,
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                max_features: self.max_features,
                bootstrap: self.bootstrap,
                seed: self.seed,
                parallel: self.parallel,
            },
            split: SplitConfig {
                test_fraction: self.test_fraction,
                seed: self.split_seed,
                stratify: self.stratify,
            },
            strict_labels: self.strict_labels,
        }
    }
}
