//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use health_lib::pipeline::EvaluationReport;
use health_lib::HealthLabel;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format a probability or ratio as a percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Color a health label
pub fn color_label(label: HealthLabel) -> String {
    match label {
        HealthLabel::Working => label.as_str().green().to_string(),
        HealthLabel::Error => label.as_str().red().to_string(),
    }
}

/// Color a score: high is good
pub fn color_score(value: f64) -> String {
    let formatted = format!("{:.3}", value);
    if value >= 0.9 {
        formatted.green().to_string()
    } else if value >= 0.7 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[derive(Tabled)]
struct ConfusionRow {
    #[tabled(rename = "Actual \\ Predicted")]
    actual: String,
    #[tabled(rename = "working")]
    working: usize,
    #[tabled(rename = "error")]
    error: usize,
}

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

/// Print an evaluation report in the requested format
pub fn print_report(report: &EvaluationReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let c = &report.confusion;
    println!("{}", "Confusion Matrix".bold());
    print_rows(vec![
        ConfusionRow {
            actual: color_label(HealthLabel::Working),
            working: c.true_negative,
            error: c.false_positive,
        },
        ConfusionRow {
            actual: color_label(HealthLabel::Error),
            working: c.false_negative,
            error: c.true_positive,
        },
    ]);
    println!(
        "TN={} FP={} FN={} TP={}",
        c.true_negative, c.false_positive, c.false_negative, c.true_positive
    );
    println!();

    let total = report.samples();
    let mut rows: Vec<ScoreRow> = report
        .classes
        .iter()
        .map(|m| ScoreRow {
            class: color_label(m.label),
            precision: color_score(m.precision),
            recall: color_score(m.recall),
            f1: color_score(m.f1),
            support: m.support,
        })
        .collect();
    for (name, avg) in [("macro avg", &report.macro_avg), ("weighted avg", &report.weighted_avg)] {
        rows.push(ScoreRow {
            class: name.to_string(),
            precision: format!("{:.3}", avg.precision),
            recall: format!("{:.3}", avg.recall),
            f1: format!("{:.3}", avg.f1),
            support: total,
        });
    }
    println!("{}", "Classification Report".bold());
    print_rows(rows);
    println!(
        "Accuracy: {} on {} samples",
        color_score(report.accuracy),
        total
    );
    Ok(())
}
