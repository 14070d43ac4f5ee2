//! Typed errors for training and model loading

use std::path::PathBuf;
use thiserror::Error;

/// Degenerate-training and configuration failures raised while fitting
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("cannot fit on an empty corpus")]
    EmptyCorpus,

    #[error("no usable samples left after cleaning ({dropped} dropped)")]
    NoUsableSamples { dropped: usize },

    #[error("row {row}: unrecognized label {value:?} (strict label checking is enabled)")]
    UnrecognizedLabel { row: usize, value: String },

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("degenerate scaler parameters: {0}")]
    DegenerateScaler(String),

    #[error("failed to seal model bundle: {0}")]
    Bundle(#[from] BundleError),
}

/// Consistency failures raised while loading or saving a model bundle.
///
/// Every variant is fatal: inference must not run against a bundle that
/// fails any of these checks.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("model bundle not found at {0}")]
    NotFound(PathBuf),

    #[error("I/O error on model bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model bundle is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model bundle is missing its `{0}` section")]
    MissingSection(&'static str),

    #[error("unsupported bundle format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("feature order mismatch: bundle has {found:?}, codec expects {expected:?}")]
    FeatureOrderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),
}
