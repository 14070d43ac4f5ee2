//! Core data models for the health classifier

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of numeric features consumed by the classifier
pub const NUM_FEATURES: usize = 5;

/// Number of health classes (working, error)
pub const NUM_CLASSES: usize = 2;

/// Canonical feature order.
///
/// This order is part of the persisted model format: the scaler, the trees
/// and the bundle metadata all index features by position. Changing it
/// requires retraining.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] =
    ["cpu_perc", "mem_usage", "mem_limit", "mem_perc", "pids"];

/// One sampled `docker stats` observation as produced by the collector.
///
/// Every field is kept as raw text. JSON numbers are accepted and converted to
/// their textual form so that the codec sees a single representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetricRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub container_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub cpu_perc: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mem_usage: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mem_limit: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mem_perc: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub net_io: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub block_io: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pids: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub label: Option<String>,
}

impl RawMetricRecord {
    /// Build an unlabeled record from the five consumed fields
    pub fn from_metrics(
        cpu_perc: impl Into<String>,
        mem_usage: impl Into<String>,
        mem_limit: impl Into<String>,
        mem_perc: impl Into<String>,
        pids: impl Into<String>,
    ) -> Self {
        Self {
            cpu_perc: Some(cpu_perc.into()),
            mem_usage: Some(mem_usage.into()),
            mem_limit: Some(mem_limit.into()),
            mem_perc: Some(mem_perc.into()),
            pids: Some(pids.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Accepts strings, numbers, booleans or null and yields `Option<String>`
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptionalText;

    impl<'de> Visitor<'de> for OptionalText {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, a number or null")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
    }

    deserializer.deserialize_option(OptionalText)
}

/// Fixed-order numeric representation of one observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cpu_perc: f64,
    pub mem_usage: f64,
    pub mem_limit: f64,
    pub mem_perc: f64,
    pub pids: f64,
}

impl FeatureVector {
    pub fn from_array(values: [f64; NUM_FEATURES]) -> Self {
        let [cpu_perc, mem_usage, mem_limit, mem_perc, pids] = values;
        Self {
            cpu_perc,
            mem_usage,
            mem_limit,
            mem_perc,
            pids,
        }
    }

    /// Values in `FEATURE_NAMES` order
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.cpu_perc,
            self.mem_usage,
            self.mem_limit,
            self.mem_perc,
            self.pids,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Binary health state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLabel {
    Working = 0,
    Error = 1,
}

impl HealthLabel {
    pub const ALL: [HealthLabel; NUM_CLASSES] = [HealthLabel::Working, HealthLabel::Error];

    /// Class index used by the trees and the wire output (`0` or `1`)
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthLabel::Working => "working",
            HealthLabel::Error => "error",
        }
    }
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label is neither `working` nor `error`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized health label {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for HealthLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "working" => Ok(HealthLabel::Working),
            "error" => Ok(HealthLabel::Error),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

/// A feature vector paired with its known label. Only exists during training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: HealthLabel,
}

impl LabeledSample {
    pub fn new(features: FeatureVector, label: HealthLabel) -> Self {
        Self { features, label }
    }
}
