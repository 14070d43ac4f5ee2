//! Container health classification library
//!
//! This crate provides the core functionality for:
//! - Turning raw `docker stats` samples into numeric feature vectors
//! - Z-score scaling and a seeded random forest classifier
//! - The offline training pipeline and its held-out evaluation
//! - Versioned, checksummed model bundles
//! - Single-record inference and observability

pub mod bundle;
pub mod classifier;
pub mod error;
pub mod inference;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod source;

pub use bundle::{BundleMetadata, ModelBundle, BUNDLE_FORMAT_VERSION};
pub use classifier::{Classifier, FeatureCodec, ForestConfig, RandomForest, Scaler, ScalerParameters};
pub use error::{BundleError, TrainingError};
pub use inference::{HealthClassifier, Prediction};
pub use models::*;
pub use observability::{ClassifierMetrics, StructuredLogger};
pub use pipeline::{DropStats, EvaluationReport, PipelineConfig, TrainingOutcome, TrainingPipeline};
pub use source::{CsvRecordSource, MemorySource, RecordSource};
