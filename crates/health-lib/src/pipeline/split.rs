//! Seeded train/test partitioning

use crate::models::{LabeledSample, NUM_CLASSES};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Train/test split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of samples held out for evaluation, in `[0, 1)`
    pub test_fraction: f64,
    pub seed: u64,
    /// Keep the class ratio the same in both partitions
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: true,
        }
    }
}

/// The two partitions produced by [`train_test_split`]
#[derive(Debug, Clone, Default)]
pub struct TrainTestSplit {
    pub train: Vec<LabeledSample>,
    pub test: Vec<LabeledSample>,
}

/// Shuffle with a fixed seed and hold out `test_fraction` of the samples.
///
/// The train partition never ends up empty: at least one sample of every
/// class present (stratified) or one sample overall stays in training.
/// Both partitions keep the input order of their samples.
pub fn train_test_split(samples: &[LabeledSample], config: &SplitConfig) -> TrainTestSplit {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let fraction = config.test_fraction.clamp(0.0, 1.0);

    let groups: Vec<Vec<usize>> = if config.stratify {
        let mut by_class = vec![Vec::new(); NUM_CLASSES];
        for (i, s) in samples.iter().enumerate() {
            by_class[s.label.index()].push(i);
        }
        by_class
    } else {
        vec![(0..samples.len()).collect()]
    };

    let mut is_test = vec![false; samples.len()];
    for mut group in groups {
        if group.is_empty() {
            continue;
        }
        group.shuffle(&mut rng);
        let n_test = held_out_count(group.len(), fraction, config.stratify);
        for &i in &group[..n_test] {
            is_test[i] = true;
        }
    }

    let mut split = TrainTestSplit::default();
    for (sample, test) in samples.iter().zip(is_test) {
        if test {
            split.test.push(*sample);
        } else {
            split.train.push(*sample);
        }
    }
    split
}

/// Held-out count for a group of `n` samples, always leaving one for training
fn held_out_count(n: usize, fraction: f64, stratified: bool) -> usize {
    let raw = n as f64 * fraction;
    let count = if stratified { raw.round() } else { raw.ceil() } as usize;
    count.min(n.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureVector, HealthLabel};

    fn corpus(working: usize, error: usize) -> Vec<LabeledSample> {
        let mut out = Vec::new();
        for i in 0..working {
            out.push(LabeledSample::new(
                FeatureVector::from_array([i as f64, 0.0, 0.0, 0.0, 0.0]),
                HealthLabel::Working,
            ));
        }
        for i in 0..error {
            out.push(LabeledSample::new(
                FeatureVector::from_array([i as f64, 1.0, 0.0, 0.0, 0.0]),
                HealthLabel::Error,
            ));
        }
        out
    }

    fn count(samples: &[LabeledSample], label: HealthLabel) -> usize {
        samples.iter().filter(|s| s.label == label).count()
    }

    #[test]
    fn test_stratified_split_keeps_ratio() {
        let samples = corpus(80, 20);
        let split = train_test_split(&samples, &SplitConfig::default());
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        assert_eq!(count(&split.test, HealthLabel::Working), 16);
        assert_eq!(count(&split.test, HealthLabel::Error), 4);
    }

    #[test]
    fn test_unstratified_split_size() {
        let samples = corpus(50, 51);
        let config = SplitConfig {
            stratify: false,
            ..SplitConfig::default()
        };
        let split = train_test_split(&samples, &config);
        // ceil(101 * 0.2) = 21
        assert_eq!(split.test.len(), 21);
        assert_eq!(split.train.len(), 80);
    }

    #[test]
    fn test_split_is_reproducible() {
        let samples = corpus(30, 30);
        let a = train_test_split(&samples, &SplitConfig::default());
        let b = train_test_split(&samples, &SplitConfig::default());
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);

        let c = train_test_split(
            &samples,
            &SplitConfig {
                seed: 1,
                ..SplitConfig::default()
            },
        );
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_tiny_classes_stay_in_training() {
        let samples = corpus(1, 1);
        let split = train_test_split(&samples, &SplitConfig::default());
        assert_eq!(split.train.len(), 2);
        assert!(split.test.is_empty());

        let split = train_test_split(
            &samples,
            &SplitConfig {
                test_fraction: 0.99,
                stratify: false,
                ..SplitConfig::default()
            },
        );
        assert_eq!(split.train.len(), 1);
    }

    #[test]
    fn test_zero_fraction_holds_nothing_out() {
        let samples = corpus(5, 5);
        let split = train_test_split(
            &samples,
            &SplitConfig {
                test_fraction: 0.0,
                ..SplitConfig::default()
            },
        );
        assert_eq!(split.train.len(), 10);
        assert!(split.test.is_empty());
    }
}
