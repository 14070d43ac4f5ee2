//! Offline training: load, clean, split, scale, fit, evaluate
//!
//! The pipeline returns a sealed [`ModelBundle`] together with the drop
//! statistics and the held-out report. Persisting the bundle is left to the
//! caller; evaluation never prevents it.

mod evaluation;
mod split;

pub use evaluation::{evaluate, AverageMetrics, ClassMetrics, ConfusionMatrix, EvaluationReport};
pub use split::{train_test_split, SplitConfig, TrainTestSplit};

use crate::bundle::ModelBundle;
use crate::classifier::{
    FeatureCodec, FieldError, ForestConfig, RandomForest, Scaler, ScalerParameters,
};
use crate::error::TrainingError;
use crate::models::{FeatureVector, HealthLabel, LabeledSample, RawMetricRecord};
use crate::observability::{ClassifierMetrics, StructuredLogger};
use crate::source::RecordSource;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Everything a training run needs besides its data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub forest: ForestConfig,
    pub split: SplitConfig,
    /// Fail the run on an unrecognized label instead of dropping the row
    pub strict_labels: bool,
}

/// Why a record was left out of the training corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    MissingLabel,
    UnrecognizedLabel,
    InvalidField(&'static str),
}

impl DropReason {
    /// Stable name used in logs and as the metric label
    pub fn name(&self) -> String {
        match self {
            DropReason::MissingLabel => "missing_label".to_string(),
            DropReason::UnrecognizedLabel => "unrecognized_label".to_string(),
            DropReason::InvalidField(field) => format!("invalid_{}", field),
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Per-reason counts of records discarded while cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropStats {
    counts: BTreeMap<DropReason, usize>,
}

impl DropStats {
    pub fn record(&mut self, reason: DropReason) {
        *self.counts.entry(reason).or_default() += 1;
    }

    pub fn count(&self, reason: DropReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DropReason, usize)> + '_ {
        self.counts.iter().map(|(r, c)| (*r, *c))
    }

    /// Counts keyed by reason name, for reports
    pub fn by_name(&self) -> BTreeMap<String, usize> {
        self.iter().map(|(r, c)| (r.name(), c)).collect()
    }
}

impl Serialize for DropStats {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.by_name().serialize(serializer)
    }
}

/// Samples that survived cleaning plus the tally of those that did not
#[derive(Debug, Clone, Default)]
pub struct CleanedCorpus {
    pub samples: Vec<LabeledSample>,
    pub drops: DropStats,
}

/// Result of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub drops: DropStats,
    /// Held-out evaluation; empty when the test partition is empty
    pub report: EvaluationReport,
    pub train_size: usize,
    pub test_size: usize,
}

/// Orchestrates one training run
pub struct TrainingPipeline {
    config: PipelineConfig,
    codec: FeatureCodec,
    metrics: ClassifierMetrics,
    logger: StructuredLogger,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, TrainingError> {
        config.forest.validate()?;
        let fraction = config.split.test_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(TrainingError::InvalidConfig(format!(
                "test_fraction must be in [0, 1), got {}",
                fraction
            )));
        }
        Ok(Self {
            config,
            codec: FeatureCodec::new(),
            metrics: ClassifierMetrics::new(),
            logger: StructuredLogger::new("training"),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load from `source` and train
    pub fn run<S: RecordSource + ?Sized>(&self, source: &S) -> Result<TrainingOutcome> {
        self.logger.log_training_started(
            &source.describe(),
            self.config.forest.n_trees,
            self.config.forest.seed,
        );
        let records = source.load()?;
        self.metrics.add_records_loaded(records.len() as u64);
        Ok(self.train(&records)?)
    }

    /// Turn raw records into labeled samples, dropping unusable rows
    pub fn clean(&self, records: &[RawMetricRecord]) -> Result<CleanedCorpus, TrainingError> {
        let mut corpus = CleanedCorpus::default();

        for (idx, record) in records.iter().enumerate() {
            let raw_label = match record.label.as_deref().map(str::trim) {
                Some(l) if !l.is_empty() => l,
                _ => {
                    corpus.drops.record(DropReason::MissingLabel);
                    continue;
                }
            };

            let label = match raw_label.parse::<HealthLabel>() {
                Ok(label) => label,
                Err(_) if self.config.strict_labels => {
                    return Err(TrainingError::UnrecognizedLabel {
                        row: idx + 1,
                        value: raw_label.to_string(),
                    });
                }
                Err(_) => {
                    corpus.drops.record(DropReason::UnrecognizedLabel);
                    continue;
                }
            };

            match self.codec.try_encode(record) {
                Ok(features) => corpus.samples.push(LabeledSample::new(features, label)),
                Err(e) => {
                    debug!(row = idx + 1, error = %e, "Dropping record");
                    corpus.drops.record(drop_reason(&e));
                }
            }
        }

        for (reason, count) in corpus.drops.iter() {
            let name = reason.name();
            self.metrics.add_samples_dropped(&name, count as u64);
            self.logger.log_samples_dropped(&name, count);
        }

        Ok(corpus)
    }

    /// Clean, split, scale, fit and evaluate
    pub fn train(&self, records: &[RawMetricRecord]) -> Result<TrainingOutcome, TrainingError> {
        if records.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }

        let CleanedCorpus { samples, drops } = self.clean(records)?;
        if samples.is_empty() {
            return Err(TrainingError::NoUsableSamples {
                dropped: drops.total(),
            });
        }

        let split = train_test_split(&samples, &self.config.split);
        info!(
            usable = samples.len(),
            dropped = drops.total(),
            train = split.train.len(),
            test = split.test.len(),
            "Corpus split"
        );

        let start = Instant::now();
        let train_features: Vec<FeatureVector> = split.train.iter().map(|s| s.features).collect();
        let scaler = Scaler::fit(&train_features)?;
        let train = scale(&scaler, &split.train);
        let test = scale(&scaler, &split.test);

        let model = RandomForest::fit(&train, &self.config.forest)?;
        let elapsed = start.elapsed();
        self.metrics.observe_fit_duration(elapsed.as_secs_f64());
        self.metrics.add_trees_built(model.n_trees() as u64);
        self.logger.log_forest_trained(
            train.len(),
            model.n_trees(),
            model.mean_depth(),
            elapsed.as_millis() as u64,
        );

        let report = evaluate(&model, &test);
        let c = report.confusion;
        self.logger.log_evaluation(
            test.len(),
            report.accuracy,
            c.true_negative,
            c.false_positive,
            c.false_negative,
            c.true_positive,
        );

        let bundle = ModelBundle::new(scaler, model, train.len())?;

        Ok(TrainingOutcome {
            bundle,
            drops,
            report,
            train_size: train.len(),
            test_size: test.len(),
        })
    }
}

fn drop_reason(error: &FieldError) -> DropReason {
    DropReason::InvalidField(error.field())
}

fn scale(scaler: &ScalerParameters, samples: &[LabeledSample]) -> Vec<LabeledSample> {
    samples
        .iter()
        .map(|s| LabeledSample::new(scaler.transform(&s.features), s.label))
        .collect()
}
