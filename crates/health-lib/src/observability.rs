//! Observability infrastructure for training and inference
//!
//! Provides:
//! - Prometheus metrics (records loaded, samples dropped, fit and prediction latency)
//! - Structured JSON-friendly event logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for single-sample inference latency (in seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05,
];

/// Histogram buckets for forest fitting (in seconds)
const FIT_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ClassifierMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ClassifierMetricsInner {
    records_loaded: IntCounter,
    samples_dropped: IntCounterVec,
    trees_built: IntCounter,
    fit_duration_seconds: Histogram,
    prediction_latency_seconds: Histogram,
    predictions: IntCounterVec,
    model_info: GaugeVec,
}

impl ClassifierMetricsInner {
    fn new() -> Self {
        Self {
            records_loaded: register_int_counter!(
                "health_classifier_records_loaded_total",
                "Raw metric records read from the training source"
            )
            .expect("Failed to register records_loaded"),

            samples_dropped: register_int_counter_vec!(
                "health_classifier_samples_dropped_total",
                "Training records discarded during cleaning, by reason",
                &["reason"]
            )
            .expect("Failed to register samples_dropped"),

            trees_built: register_int_counter!(
                "health_classifier_trees_built_total",
                "Decision trees grown across all training runs"
            )
            .expect("Failed to register trees_built"),

            fit_duration_seconds: register_histogram!(
                "health_classifier_fit_duration_seconds",
                "Time spent fitting the scaler and the random forest",
                FIT_BUCKETS.to_vec()
            )
            .expect("Failed to register fit_duration_seconds"),

            prediction_latency_seconds: register_histogram!(
                "health_classifier_prediction_latency_seconds",
                "Time spent encoding, scaling and classifying one record",
                PREDICTION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter_vec!(
                "health_classifier_predictions_total",
                "Predictions generated, by predicted label",
                &["label"]
            )
            .expect("Failed to register predictions"),

            model_info: register_gauge_vec!(
                "health_classifier_model_info",
                "Information about the currently loaded model bundle",
                &["model_version", "n_trees"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Classifier metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ClassifierMetrics {
    _private: (),
}

impl Default for ClassifierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ClassifierMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ClassifierMetricsInner {
        GLOBAL_METRICS.get_or_init(ClassifierMetricsInner::new)
    }

    pub fn add_records_loaded(&self, count: u64) {
        self.inner().records_loaded.inc_by(count);
    }

    pub fn add_samples_dropped(&self, reason: &str, count: u64) {
        self.inner()
            .samples_dropped
            .with_label_values(&[reason])
            .inc_by(count);
    }

    pub fn add_trees_built(&self, count: u64) {
        self.inner().trees_built.inc_by(count);
    }

    pub fn observe_fit_duration(&self, duration_secs: f64) {
        self.inner().fit_duration_seconds.observe(duration_secs);
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, label: &str) {
        self.inner().predictions.with_label_values(&[label]).inc();
    }

    /// Update model info, replacing any previously loaded version
    pub fn set_model_info(&self, model_version: &str, n_trees: usize) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[model_version, &n_trees.to_string()])
            .set(1.0);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for classifier events
///
/// Provides consistent logging for training runs, model bundles and
/// predictions so that every event carries the component that emitted it.
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log the start of a training run
    pub fn log_training_started(&self, source: &str, n_trees: usize, seed: u64) {
        info!(
            event = "training_started",
            component = %self.component,
            source = %source,
            n_trees = n_trees,
            seed = seed,
            "Training run started"
        );
    }

    /// Log records dropped while cleaning the corpus
    pub fn log_samples_dropped(&self, reason: &str, count: usize) {
        warn!(
            event = "samples_dropped",
            component = %self.component,
            reason = %reason,
            count = count,
            "Discarded training records"
        );
    }

    /// Log the completion of forest fitting
    pub fn log_forest_trained(
        &self,
        train_samples: usize,
        n_trees: usize,
        mean_depth: f64,
        elapsed_ms: u64,
    ) {
        info!(
            event = "forest_trained",
            component = %self.component,
            train_samples = train_samples,
            n_trees = n_trees,
            mean_depth = mean_depth,
            elapsed_ms = elapsed_ms,
            "Random forest fitted"
        );
    }

    /// Log held-out evaluation results
    pub fn log_evaluation(
        &self,
        test_samples: usize,
        accuracy: f64,
        true_negative: usize,
        false_positive: usize,
        false_negative: usize,
        true_positive: usize,
    ) {
        info!(
            event = "evaluation_completed",
            component = %self.component,
            test_samples = test_samples,
            accuracy = accuracy,
            true_negative = true_negative,
            false_positive = false_positive,
            false_negative = false_negative,
            true_positive = true_positive,
            "Evaluated model on held-out partition"
        );
    }

    /// Log a bundle written to disk
    pub fn log_bundle_saved(&self, path: &str, model_version: &str, checksum: &str) {
        info!(
            event = "bundle_saved",
            component = %self.component,
            path = %path,
            model_version = %model_version,
            checksum = %checksum,
            "Model bundle saved"
        );
    }

    /// Log a bundle loaded for inference
    pub fn log_bundle_loaded(&self, path: &str, model_version: &str, n_trees: usize) {
        info!(
            event = "bundle_loaded",
            component = %self.component,
            path = %path,
            model_version = %model_version,
            n_trees = n_trees,
            "Model bundle loaded"
        );
    }

    /// Log a single prediction
    pub fn log_prediction(&self, label: &str, error_probability: f64, model_version: &str) {
        info!(
            event = "prediction_generated",
            component = %self.component,
            label = %label,
            error_probability = error_probability,
            model_version = %model_version,
            "Generated health prediction"
        );
    }

    /// Log process shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            component = %self.component,
            reason = %reason,
            "Shutting down"
        );
    }
}
