//! Held-out evaluation: confusion matrix and per-class scores

use crate::classifier::Classifier;
use crate::models::{HealthLabel, LabeledSample, NUM_CLASSES};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2x2 confusion matrix with `Error` as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: HealthLabel, predicted: HealthLabel) {
        match (actual, predicted) {
            (HealthLabel::Working, HealthLabel::Working) => self.true_negative += 1,
            (HealthLabel::Working, HealthLabel::Error) => self.false_positive += 1,
            (HealthLabel::Error, HealthLabel::Working) => self.false_negative += 1,
            (HealthLabel::Error, HealthLabel::Error) => self.true_positive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn correct(&self) -> usize {
        self.true_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Rows are actual labels, columns predicted labels, both in class order
    pub fn as_rows(&self) -> [[usize; NUM_CLASSES]; NUM_CLASSES] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    fn class_metrics(&self, label: HealthLabel) -> ClassMetrics {
        let (tp, fp, fn_) = match label {
            HealthLabel::Error => (self.true_positive, self.false_positive, self.false_negative),
            HealthLabel::Working => (self.true_negative, self.false_negative, self.false_positive),
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassMetrics {
            label,
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: HealthLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of test samples whose actual label is this class
    pub support: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Full evaluation of a classifier on a labeled partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub confusion: ConfusionMatrix,
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

impl EvaluationReport {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let classes: Vec<ClassMetrics> = HealthLabel::ALL
            .iter()
            .map(|&label| confusion.class_metrics(label))
            .collect();

        let n = classes.len() as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
        };

        let total = confusion.total();
        let weighted_avg = AverageMetrics {
            precision: support_weighted(&classes, total, |c| c.precision),
            recall: support_weighted(&classes, total, |c| c.recall),
            f1: support_weighted(&classes, total, |c| c.f1),
        };

        Self {
            confusion,
            accuracy: confusion.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Number of samples the report was computed on
    pub fn samples(&self) -> usize {
        self.confusion.total()
    }

    pub fn class(&self, label: HealthLabel) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

/// Run the classifier over already-scaled samples and score the predictions
pub fn evaluate<C: Classifier + ?Sized>(
    classifier: &C,
    samples: &[LabeledSample],
) -> EvaluationReport {
    let mut confusion = ConfusionMatrix::default();
    for sample in samples {
        confusion.record(sample.label, classifier.predict(&sample.features));
    }
    EvaluationReport::from_confusion(confusion)
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.confusion;
        writeln!(f, "Confusion matrix (rows = actual, columns = predicted):")?;
        writeln!(f, "{:>12} {:>9} {:>9}", "", "working", "error")?;
        for (label, row) in HealthLabel::ALL.iter().zip(c.as_rows()) {
            writeln!(f, "{:>12} {:>9} {:>9}", label.as_str(), row[0], row[1])?;
        }
        writeln!(
            f,
            "TN={} FP={} FN={} TP={}",
            c.true_negative, c.false_positive, c.false_negative, c.true_positive
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.label.as_str(),
                class.precision,
                class.recall,
                class.f1,
                class.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.samples()
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name,
                avg.precision,
                avg.recall,
                avg.f1,
                self.samples()
            )?;
        }
        Ok(())
    }
}

/// Mean of `metric` over classes, weighted by support
fn support_weighted<F>(classes: &[ClassMetrics], total: usize, metric: F) -> f64
where
    F: Fn(&ClassMetrics) -> f64,
{
    if total == 0 {
        return 0.0;
    }
    classes
        .iter()
        .map(|c| metric(c) * c.support as f64)
        .sum::<f64>()
        / total as f64
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;

    /// Predicts `Error` whenever the first feature is positive
    struct SignClassifier;

    impl Classifier for SignClassifier {
        fn predict(&self, features: &FeatureVector) -> HealthLabel {
            if features.cpu_perc > 0.0 {
                HealthLabel::Error
            } else {
                HealthLabel::Working
            }
        }

        fn predict_proba(&self, features: &FeatureVector) -> [f64; NUM_CLASSES] {
            match self.predict(features) {
                HealthLabel::Working => [1.0, 0.0],
                HealthLabel::Error => [0.0, 1.0],
            }
        }
    }

    fn sample(cpu: f64, label: HealthLabel) -> LabeledSample {
        LabeledSample::new(FeatureVector::from_array([cpu, 0.0, 0.0, 0.0, 0.0]), label)
    }

    #[test]
    fn test_confusion_matrix_arithmetic() {
        let samples = vec![
            sample(-1.0, HealthLabel::Working),
            sample(-1.0, HealthLabel::Working),
            sample(-1.0, HealthLabel::Working),
            sample(1.0, HealthLabel::Working),
            sample(1.0, HealthLabel::Error),
            sample(1.0, HealthLabel::Error),
            sample(-1.0, HealthLabel::Error),
        ];
        let report = evaluate(&SignClassifier, &samples);
        let c = report.confusion;
        assert_eq!(c.true_negative, 3);
        assert_eq!(c.false_positive, 1);
        assert_eq!(c.false_negative, 1);
        assert_eq!(c.true_positive, 2);
        assert_eq!(c.total(), 7);
        assert!((report.accuracy - 5.0 / 7.0).abs() < 1e-12);

        let error = report.class(HealthLabel::Error).unwrap();
        assert!((error.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((error.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(error.support, 3);

        let working = report.class(HealthLabel::Working).unwrap();
        assert!((working.precision - 3.0 / 4.0).abs() < 1e-12);
        assert!((working.recall - 3.0 / 4.0).abs() < 1e-12);
        assert_eq!(working.support, 4);

        let expected_weighted = (0.75 * 4.0 + (2.0 / 3.0) * 3.0) / 7.0;
        assert!((report.weighted_avg.recall - expected_weighted).abs() < 1e-12);
        let expected_macro = (0.75 + 2.0 / 3.0) / 2.0;
        assert!((report.macro_avg.precision - expected_macro).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let samples = vec![sample(-1.0, HealthLabel::Working)];
        let report = evaluate(&SignClassifier, &samples);
        let error = report.class(HealthLabel::Error).unwrap();
        assert_eq!(error.precision, 0.0);
        assert_eq!(error.recall, 0.0);
        assert_eq!(error.f1, 0.0);
        assert_eq!(report.accuracy, 1.0);
    }

    #[test]
    fn test_empty_partition() {
        let report = evaluate(&SignClassifier, &[]);
        assert_eq!(report.samples(), 0);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.weighted_avg, AverageMetrics::default());
    }

    #[test]
    fn test_report_display_lists_counts() {
        let samples = vec![sample(1.0, HealthLabel::Error), sample(1.0, HealthLabel::Working)];
        let text = evaluate(&SignClassifier, &samples).to_string();
        assert!(text.contains("TN=0 FP=1 FN=0 TP=1"));
        assert!(text.contains(&format!("{:>12} {:>9} {:>9}", "working", 0, 1)));
        assert!(text.contains("weighted avg"));
    }
}
