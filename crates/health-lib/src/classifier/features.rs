//! Feature encoding for training and inference
//!
//! Turns raw `docker stats` text (`"12.34%"`, `"512MiB / 1GiB"`, `"17"`) into a
//! fixed-order [`FeatureVector`]. Training and inference must go through the
//! same codec: a difference in cleaning rules between the two silently
//! shifts every prediction.

use crate::models::{FeatureVector, RawMetricRecord, FEATURE_NAMES, NUM_FEATURES};
use thiserror::Error;

/// Separator docker uses for `usage / limit` memory columns
const COMPOUND_SEPARATOR: &str = " / ";

const MIB: f64 = 1024.0 * 1024.0;

/// Memory unit suffixes and their size in MiB. Longest suffixes first so that
/// `MiB` is not mistaken for `B`.
const MEMORY_UNITS: &[(&str, f64)] = &[
    ("KiB", 1.0 / 1024.0),
    ("MiB", 1.0),
    ("GiB", 1024.0),
    ("TiB", 1024.0 * 1024.0),
    ("kB", 1e3 / MIB),
    ("KB", 1e3 / MIB),
    ("MB", 1e6 / MIB),
    ("GB", 1e9 / MIB),
    ("TB", 1e12 / MIB),
    ("B", 1.0 / MIB),
];

/// How the raw text of a field is cleaned before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Percent,
    Memory,
    Count,
}

const FIELD_KINDS: [FieldKind; NUM_FEATURES] = [
    FieldKind::Percent,
    FieldKind::Memory,
    FieldKind::Memory,
    FieldKind::Percent,
    FieldKind::Count,
];

/// Why a field could not be turned into a finite number
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field `{0}` is missing or empty")]
    Missing(&'static str),

    #[error("field `{field}` has unparseable value {raw:?}")]
    Unparseable { field: &'static str, raw: String },

    #[error("field `{field}` is not finite ({raw:?})")]
    NonFinite { field: &'static str, raw: String },
}

impl FieldError {
    /// Name of the offending feature
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing(field) => field,
            FieldError::Unparseable { field, .. } => field,
            FieldError::NonFinite { field, .. } => field,
        }
    }

    /// Position of the offending feature in `FEATURE_NAMES`
    pub fn index(&self) -> usize {
        let name = self.field();
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .unwrap_or_default()
    }
}

/// Converts raw metric records into feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureCodec;

impl FeatureCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode a record, replacing anything unparseable with `0`.
    ///
    /// Total: never fails and never yields NaN or infinity.
    pub fn encode(&self, record: &RawMetricRecord) -> FeatureVector {
        let fields = self.resolve_fields(record);
        let mut values = [0.0; NUM_FEATURES];
        for (i, raw) in fields.into_iter().enumerate() {
            values[i] = raw
                .and_then(|text| parse_field(FEATURE_NAMES[i], text, FIELD_KINDS[i]).ok())
                .unwrap_or(0.0);
        }
        FeatureVector::from_array(values)
    }

    /// Encode a record, reporting the first field that cannot be parsed
    /// instead of imputing it. Used to clean the training corpus.
    pub fn try_encode(&self, record: &RawMetricRecord) -> Result<FeatureVector, FieldError> {
        let fields = self.resolve_fields(record);
        let mut values = [0.0; NUM_FEATURES];
        for (i, raw) in fields.into_iter().enumerate() {
            let text = raw.ok_or(FieldError::Missing(FEATURE_NAMES[i]))?;
            values[i] = parse_field(FEATURE_NAMES[i], text, FIELD_KINDS[i])?;
        }
        Ok(FeatureVector::from_array(values))
    }

    /// Pick the raw text for each feature, splitting compound memory columns.
    ///
    /// A compound `mem_usage` (`"X / Y"`) supplies the limit only when the
    /// record carries no `mem_limit` of its own.
    fn resolve_fields<'a>(&self, record: &'a RawMetricRecord) -> [Option<&'a str>; NUM_FEATURES] {
        let non_blank = |v: Option<&'a str>| v.filter(|s| !s.trim().is_empty());

        let (usage, usage_limit) = match non_blank(record.mem_usage.as_deref()) {
            Some(text) => match text.split_once(COMPOUND_SEPARATOR) {
                Some((left, right)) => (Some(left), Some(right)),
                None => (Some(text), None),
            },
            None => (None, None),
        };

        let limit = match non_blank(record.mem_limit.as_deref()) {
            Some(text) => match text.split_once(COMPOUND_SEPARATOR) {
                Some((_, right)) => Some(right),
                None => Some(text),
            },
            None => usage_limit,
        };

        [
            record.cpu_perc.as_deref(),
            usage,
            limit,
            record.mem_perc.as_deref(),
            record.pids.as_deref(),
        ]
    }
}

fn parse_field(field: &'static str, raw: &str, kind: FieldKind) -> Result<f64, FieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Missing(field));
    }

    let (number, multiplier) = match kind {
        FieldKind::Percent => (trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end(), 1.0),
        FieldKind::Memory => strip_memory_unit(trimmed),
        FieldKind::Count => (trimmed, 1.0),
    };

    let value: f64 = number.parse().map_err(|_| FieldError::Unparseable {
        field,
        raw: raw.to_string(),
    })?;

    let scaled = value * multiplier;
    if !scaled.is_finite() {
        return Err(FieldError::NonFinite {
            field,
            raw: raw.to_string(),
        });
    }
    Ok(scaled)
}

/// Strip a memory unit suffix and return the bare number with its MiB factor
fn strip_memory_unit(text: &str) -> (&str, f64) {
    for (suffix, factor) in MEMORY_UNITS {
        if let Some(number) = text.strip_suffix(suffix) {
            return (number.trim_end(), *factor);
        }
    }
    (text, 1.0)
}
