//! Classify a single metric record

use anyhow::{Context, Result};
use health_lib::{HealthClassifier, RawMetricRecord};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::{print_json, OutputFormat};

/// Field values given on the command line
#[derive(Debug, Clone, Default)]
pub struct MetricFlags {
    pub cpu_perc: Option<String>,
    pub mem_usage: Option<String>,
    pub mem_limit: Option<String>,
    pub mem_perc: Option<String>,
    pub pids: Option<String>,
}

impl MetricFlags {
    fn is_empty(&self) -> bool {
        self.cpu_perc.is_none()
            && self.mem_usage.is_none()
            && self.mem_limit.is_none()
            && self.mem_perc.is_none()
            && self.pids.is_none()
    }

    fn into_record(self) -> RawMetricRecord {
        RawMetricRecord {
            cpu_perc: self.cpu_perc,
            mem_usage: self.mem_usage,
            mem_limit: self.mem_limit,
            mem_perc: self.mem_perc,
            pids: self.pids,
            ..Default::default()
        }
    }
}

/// Predict `0` (working) or `1` (error) for one record.
///
/// The record comes from the flags when any is given, otherwise from
/// `--input` or stdin as a JSON object.
pub fn predict(
    bundle: &Path,
    input: Option<PathBuf>,
    flags: MetricFlags,
    format: OutputFormat,
) -> Result<()> {
    let classifier = HealthClassifier::load(bundle)
        .with_context(|| format!("Failed to load model bundle {:?}", bundle))?;

    let prediction = if !flags.is_empty() {
        let record = flags.into_record();
        debug!(?record, "Classifying record from flags");
        classifier.score(&record)
    } else {
        let json = read_input(input.as_deref())?;
        debug!(bytes = json.len(), "Classifying record from JSON");
        classifier.score_json(&json)?
    };
    match format {
        OutputFormat::Table => println!("{}", prediction.code),
        OutputFormat::Json => print_json(&prediction)?,
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {:?}", path)),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read record from stdin")?;
            Ok(buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_build_record() {
        let flags = MetricFlags {
            cpu_perc: Some("12%".to_string()),
            mem_usage: Some("110MiB / 1000MiB".to_string()),
            ..MetricFlags::default()
        };
        assert!(!flags.is_empty());
        let record = flags.into_record();
        assert_eq!(record.cpu_perc.as_deref(), Some("12%"));
        assert!(record.mem_limit.is_none());
        assert!(record.label.is_none());
    }

    #[test]
    fn test_empty_flags() {
        assert!(MetricFlags::default().is_empty());
    }
}
