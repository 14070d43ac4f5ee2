//! Describe a model bundle

use anyhow::{Context, Result};
use colored::Colorize;
use health_lib::{ModelBundle, FEATURE_NAMES};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_percent, print_json, print_rows, print_success, OutputFormat};

/// Row for the per-feature table
#[derive(Tabled, Serialize)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std Dev")]
    std_dev: String,
    #[tabled(rename = "Constant")]
    constant: bool,
    #[tabled(rename = "Importance")]
    importance: String,
}

#[derive(Serialize)]
struct BundleSummary<'a> {
    model_version: &'a str,
    checksum: &'a str,
    format_version: u32,
    trained_at: String,
    training_samples: usize,
    n_trees: usize,
    mean_depth: f64,
    class_counts: [usize; 2],
    config: &'a health_lib::ForestConfig,
    features: Vec<FeatureRow>,
}

/// Show metadata, scaler parameters and feature importances of a bundle
pub fn inspect(bundle_path: &Path, format: OutputFormat) -> Result<()> {
    let bundle = ModelBundle::load(bundle_path)
        .with_context(|| format!("Failed to load model bundle {:?}", bundle_path))?;

    let importances = bundle.model.feature_importances();
    let features: Vec<FeatureRow> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| FeatureRow {
            feature: name.to_string(),
            mean: format!("{:.4}", bundle.scaler.mean[i]),
            std_dev: format!("{:.4}", bundle.scaler.std_dev[i]),
            constant: bundle.scaler.constant[i],
            importance: format_percent(importances[i]),
        })
        .collect();

    let meta = &bundle.metadata;
    match format {
        OutputFormat::Json => {
            let summary = BundleSummary {
                model_version: &meta.model_version,
                checksum: &meta.checksum,
                format_version: meta.format_version,
                trained_at: meta.trained_at.to_rfc3339(),
                training_samples: meta.training_samples,
                n_trees: bundle.model.n_trees(),
                mean_depth: bundle.model.mean_depth(),
                class_counts: bundle.model.class_counts(),
                config: bundle.model.config(),
                features,
            };
            print_json(&summary)?;
        }
        OutputFormat::Table => {
            println!("{}", "Model Bundle".bold());
            println!("{}", "=".repeat(60));
            println!("Path:             {}", bundle_path.display().to_string().cyan());
            println!("Version:          {}", meta.model_version.cyan());
            println!("Format:           v{}", meta.format_version);
            println!("Trained at:       {}", meta.trained_at.to_rfc3339());
            println!("Training samples: {}", meta.training_samples);
            let counts = bundle.model.class_counts();
            println!("Class balance:    {} working / {} error", counts[0], counts[1]);

            let config = bundle.model.config();
            println!(
                "Forest:           {} trees, mean depth {:.1}, max_depth {}, max_features {}, seed {}",
                bundle.model.n_trees(),
                bundle.model.mean_depth(),
                config.max_depth,
                config.resolved_max_features(),
                config.seed
            );
            println!();
            print_rows(features);
            print_success(&format!("Checksum verified ({})", &meta.checksum[..16]));
        }
    }
    Ok(())
}
