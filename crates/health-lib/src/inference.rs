//! Single-record health classification against a loaded bundle
//!
//! `encode -> transform -> predict` with no state carried between calls.
//! Clones share the bundle through an `Arc`.

use crate::bundle::ModelBundle;
use crate::classifier::{Classifier, FeatureCodec};
use crate::error::BundleError;
use crate::models::{FeatureVector, HealthLabel, RawMetricRecord, NUM_CLASSES};
use crate::observability::{ClassifierMetrics, StructuredLogger};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Latency above which a single classification is logged as slow
const MAX_CLASSIFY_MS: u128 = 5;

/// Outcome of scoring one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: HealthLabel,
    /// `0` for working, `1` for error
    pub code: u8,
    /// Probability per class, indexed by `HealthLabel::index`
    pub probabilities: [f64; NUM_CLASSES],
    pub model_version: String,
}

impl Prediction {
    pub fn error_probability(&self) -> f64 {
        self.probabilities[HealthLabel::Error.index()]
    }
}

/// Inference service over an immutable model bundle
#[derive(Clone)]
pub struct HealthClassifier {
    bundle: Arc<ModelBundle>,
    codec: FeatureCodec,
    metrics: ClassifierMetrics,
    logger: StructuredLogger,
}

impl HealthClassifier {
    pub fn from_bundle(bundle: ModelBundle) -> Self {
        let metrics = ClassifierMetrics::new();
        metrics.set_model_info(bundle.model_version(), bundle.model.n_trees());
        Self {
            bundle: Arc::new(bundle),
            codec: FeatureCodec::new(),
            metrics,
            logger: StructuredLogger::new("inference"),
        }
    }

    /// Load and verify a bundle, refusing to start on any inconsistency
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let bundle = ModelBundle::load(path)?;
        let service = Self::from_bundle(bundle);
        service.logger.log_bundle_loaded(
            &path.display().to_string(),
            service.bundle.model_version(),
            service.bundle.model.n_trees(),
        );
        Ok(service)
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn model_version(&self) -> &str {
        self.bundle.model_version()
    }

    /// Encoded and scaled features exactly as the forest sees them
    pub fn scaled_features(&self, record: &RawMetricRecord) -> FeatureVector {
        let features = self.codec.encode(record);
        self.bundle.scaler.transform(&features)
    }

    pub fn classify(&self, record: &RawMetricRecord) -> HealthLabel {
        self.score(record).label
    }

    /// Classify a record and report class probabilities
    pub fn score(&self, record: &RawMetricRecord) -> Prediction {
        let start = Instant::now();

        let scaled = self.scaled_features(record);
        let label = self.bundle.model.predict(&scaled);
        let probabilities = self.bundle.model.predict_proba(&scaled);

        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.metrics.inc_predictions(label.as_str());
        if elapsed.as_millis() > MAX_CLASSIFY_MS {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Classification exceeded {}ms target", MAX_CLASSIFY_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Classification completed");
        }

        let prediction = Prediction {
            label,
            code: label.index() as u8,
            probabilities,
            model_version: self.bundle.model_version().to_string(),
        };
        self.logger.log_prediction(
            label.as_str(),
            prediction.error_probability(),
            &prediction.model_version,
        );
        prediction
    }

    /// Classify one JSON object carrying the collector's field names
    pub fn classify_json(&self, json: &str) -> Result<HealthLabel> {
        Ok(self.score_json(json)?.label)
    }

    pub fn score_json(&self, json: &str) -> Result<Prediction> {
        let record: RawMetricRecord =
            serde_json::from_str(json).context("Failed to parse metric record JSON")?;
        Ok(self.score(&record))
    }
}
