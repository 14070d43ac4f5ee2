//! Score a model bundle against a labeled CSV

use anyhow::{Context, Result};
use colored::Colorize;
use health_lib::pipeline::{evaluate as score_samples, PipelineConfig, TrainingPipeline};
use health_lib::{CsvRecordSource, LabeledSample, ModelBundle, RecordSource};
use std::path::Path;

use crate::output::{print_error, print_report, print_warning, OutputFormat};

/// Evaluate the bundle on every usable row of `data`
pub fn evaluate(bundle_path: &Path, data: &Path, format: OutputFormat) -> Result<()> {
    let bundle = ModelBundle::load(bundle_path)
        .with_context(|| format!("Failed to load model bundle {:?}", bundle_path))?;
    let records = CsvRecordSource::new(data).load()?;

    // Same cleaning rules as training, without the split
    let cleaner = TrainingPipeline::new(PipelineConfig::default())?;
    let corpus = cleaner.clean(&records)?;
    if corpus.samples.is_empty() {
        print_error(&format!("No usable labeled rows in {}", data.display()));
        anyhow::bail!("nothing to evaluate");
    }

    let scaled: Vec<LabeledSample> = corpus
        .samples
        .iter()
        .map(|s| LabeledSample::new(bundle.scaler.transform(&s.features), s.label))
        .collect();
    let report = score_samples(&bundle.model, &scaled);

    if format == OutputFormat::Table {
        println!(
            "Evaluating {} on {}",
            bundle.model_version().cyan(),
            data.display().to_string().cyan()
        );
        if !corpus.drops.is_empty() {
            print_warning(&format!(
                "Skipped {} rows: {}",
                corpus.drops.total(),
                corpus
                    .drops
                    .iter()
                    .map(|(reason, count)| format!("{}={}", reason, count))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        println!();
    }
    print_report(&report, format)
}
