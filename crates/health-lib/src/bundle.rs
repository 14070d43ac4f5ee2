//! Versioned model bundle: scaler parameters and forest persisted together
//!
//! The bundle is a single pretty-printed JSON document:
//!
//! ```text
//! { "metadata": { format_version, feature_order, trained_at,
//!                 training_samples, model_version, checksum },
//!   "scaler":   { mean, std_dev, constant, samples },
//!   "model":    { config, trees, class_counts } }
//! ```
//!
//! The checksum is the SHA-256 of the compact JSON encoding of
//! `{feature_order, scaler, model}`. Loading re-encodes the parsed payload and
//! refuses the bundle on any mismatch.

use crate::classifier::{RandomForest, ScalerParameters};
use crate::error::BundleError;
use crate::models::{FEATURE_NAMES, NUM_FEATURES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Bundle layout version understood by this build
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Hex characters of the checksum used in the model version string
const VERSION_CHECKSUM_CHARS: usize = 12;

/// Descriptive header of a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub format_version: u32,
    /// Feature names in the order the scaler and trees index them
    pub feature_order: Vec<String>,
    pub trained_at: DateTime<Utc>,
    /// Samples in the training partition
    pub training_samples: usize,
    pub model_version: String,
    /// Hex SHA-256 of the payload
    pub checksum: String,
}

/// Scaler parameters and forest trained together in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub metadata: BundleMetadata,
    pub scaler: ScalerParameters,
    pub model: RandomForest,
}

/// The checksummed part of a bundle
#[derive(Serialize)]
struct Payload<'a> {
    feature_order: &'a [String],
    scaler: &'a ScalerParameters,
    model: &'a RandomForest,
}

impl ModelBundle {
    /// Seal freshly trained parameters into a bundle stamped with the current time
    pub fn new(
        scaler: ScalerParameters,
        model: RandomForest,
        training_samples: usize,
    ) -> Result<Self, BundleError> {
        let feature_order = expected_feature_order();
        let checksum = compute_checksum(&feature_order, &scaler, &model)?;
        let model_version = format!(
            "v{}-{}",
            BUNDLE_FORMAT_VERSION,
            &checksum[..VERSION_CHECKSUM_CHARS]
        );

        Ok(Self {
            metadata: BundleMetadata {
                format_version: BUNDLE_FORMAT_VERSION,
                feature_order,
                trained_at: Utc::now(),
                training_samples,
                model_version,
                checksum,
            },
            scaler,
            model,
        })
    }

    pub fn model_version(&self) -> &str {
        &self.metadata.model_version
    }

    pub fn checksum(&self) -> &str {
        &self.metadata.checksum
    }

    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and verify a bundle document
    pub fn from_json(text: &str) -> Result<Self, BundleError> {
        let mut root: Map<String, Value> = serde_json::from_str(text)?;
        let metadata = take_section(&mut root, "metadata")?;
        let scaler = take_section(&mut root, "scaler")?;
        let model = take_section(&mut root, "model")?;

        let metadata: BundleMetadata = serde_json::from_value(metadata)?;
        if metadata.format_version != BUNDLE_FORMAT_VERSION {
            return Err(BundleError::UnsupportedVersion {
                found: metadata.format_version,
                supported: BUNDLE_FORMAT_VERSION,
            });
        }

        let expected = expected_feature_order();
        if metadata.feature_order != expected {
            return Err(BundleError::FeatureOrderMismatch {
                expected,
                found: metadata.feature_order,
            });
        }

        let scaler: ScalerParameters = serde_json::from_value(scaler)?;
        let model: RandomForest = serde_json::from_value(model)?;
        scaler.validate().map_err(BundleError::InvalidModel)?;
        model.validate().map_err(BundleError::InvalidModel)?;

        let computed = compute_checksum(&metadata.feature_order, &scaler, &model)?;
        if computed != metadata.checksum {
            return Err(BundleError::ChecksumMismatch {
                expected: metadata.checksum,
                computed,
            });
        }

        Ok(Self {
            metadata,
            scaler,
            model,
        })
    }

    /// Write the bundle atomically: temp file, fsync, rename
    pub fn save(&self, path: &Path) -> Result<(), BundleError> {
        let io_err = |source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = self.to_json()?;
        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)?;

        info!(
            path = %path.display(),
            model_version = %self.metadata.model_version,
            bytes = json.len(),
            "Model bundle written"
        );
        Ok(())
    }

    /// Read and verify a bundle from disk
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        if !path.exists() {
            return Err(BundleError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            model_version = %bundle.metadata.model_version,
            "Model bundle verified"
        );
        Ok(bundle)
    }
}

/// `FEATURE_NAMES` as owned strings
pub fn expected_feature_order() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

fn take_section(root: &mut Map<String, Value>, name: &'static str) -> Result<Value, BundleError> {
    match root.remove(name) {
        None | Some(Value::Null) => Err(BundleError::MissingSection(name)),
        Some(value) => Ok(value),
    }
}

fn compute_checksum(
    feature_order: &[String],
    scaler: &ScalerParameters,
    model: &RandomForest,
) -> Result<String, BundleError> {
    debug_assert_eq!(feature_order.len(), NUM_FEATURES);
    let payload = serde_json::to_vec(&Payload {
        feature_order,
        scaler,
        model,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&payload);
    Ok(hex::encode(hasher.finalize()))
}
