//! Random forest ensemble
//!
//! Trees are trained on bootstrap draws of the training set with random
//! feature subsets at each split, and vote by simple majority.
//!
//! Every tree gets its own seed, drawn sequentially from a master RNG seeded
//! with [`ForestConfig::seed`] before any tree is grown. A tree therefore
//! depends only on its own seed and building the trees in parallel yields the
//! same model as building them one after another.

use super::tree::{majority_class, DecisionTree, TreeParams};
use super::Classifier;
use crate::error::TrainingError;
use crate::models::{FeatureVector, HealthLabel, LabeledSample, NUM_CLASSES, NUM_FEATURES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` means `floor(sqrt(NUM_FEATURES))`
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree instead of using the full set
    pub bootstrap: bool,
    /// Master seed for bootstrap draws and feature subsampling
    pub seed: u64,
    /// Build trees on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 24,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
            parallel: true,
        }
    }
}

impl ForestConfig {
    /// Features examined per split after applying the default
    pub fn resolved_max_features(&self) -> usize {
        self.max_features
            .unwrap_or_else(|| (NUM_FEATURES as f64).sqrt().floor() as usize)
            .clamp(1, NUM_FEATURES)
    }

    pub fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.resolved_max_features(),
        }
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.n_trees == 0 {
            return Err(TrainingError::InvalidConfig(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainingError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if let Some(m) = self.max_features {
            if m == 0 || m > NUM_FEATURES {
                return Err(TrainingError::InvalidConfig(format!(
                    "max_features must be between 1 and {}, got {}",
                    NUM_FEATURES, m
                )));
            }
        }
        Ok(())
    }
}

/// Trained ensemble: the trees plus the configuration that built them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    /// Training samples per class seen by `fit`
    class_counts: [usize; NUM_CLASSES],
}

impl RandomForest {
    /// Train a forest on already-scaled samples
    pub fn fit(samples: &[LabeledSample], config: &ForestConfig) -> Result<Self, TrainingError> {
        config.validate()?;
        if samples.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }

        let start = Instant::now();
        let features: Vec<[f64; NUM_FEATURES]> =
            samples.iter().map(|s| s.features.to_array()).collect();
        let labels: Vec<HealthLabel> = samples.iter().map(|s| s.label).collect();

        let mut class_counts = [0usize; NUM_CLASSES];
        for label in &labels {
            class_counts[label.index()] += 1;
        }

        let tree_seeds = derive_tree_seeds(config.seed, config.n_trees);
        let params = config.tree_params();
        let n = samples.len();

        let grow = |tree_seed: u64| -> DecisionTree {
            let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);
            let indices: Vec<usize> = if config.bootstrap {
                (0..n).map(|_| rng.random_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            DecisionTree::fit(&features, &labels, indices, &params, &mut rng)
        };

        let trees: Vec<DecisionTree> = if config.parallel {
            tree_seeds.par_iter().map(|&s| grow(s)).collect()
        } else {
            tree_seeds.iter().map(|&s| grow(s)).collect()
        };

        let forest = Self {
            config: config.clone(),
            trees,
            class_counts,
        };

        info!(
            n_trees = forest.trees.len(),
            samples = n,
            working = class_counts[HealthLabel::Working.index()],
            error = class_counts[HealthLabel::Error.index()],
            max_features = params.max_features,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Random forest trained"
        );
        debug!(
            mean_depth = forest.mean_depth(),
            total_nodes = forest.trees.iter().map(|t| t.node_count()).sum::<usize>(),
            "Forest shape"
        );

        Ok(forest)
    }

    /// Per-class vote counts across all trees
    pub fn votes(&self, features: &FeatureVector) -> [usize; NUM_CLASSES] {
        let x = features.to_array();
        let mut votes = [0usize; NUM_CLASSES];
        for tree in &self.trees {
            votes[tree.predict_array(&x).index()] += 1;
        }
        votes
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn class_counts(&self) -> [usize; NUM_CLASSES] {
        self.class_counts
    }

    pub fn mean_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.depth() as f64).sum::<f64>() / self.trees.len() as f64
    }

    /// Share of splits made on each feature across the forest
    pub fn feature_importances(&self) -> [f64; NUM_FEATURES] {
        let mut counts = [0usize; NUM_FEATURES];
        for tree in &self.trees {
            for (total, c) in counts.iter_mut().zip(tree.split_counts()) {
                *total += c;
            }
        }
        let sum: usize = counts.iter().sum();
        let mut shares = [0.0; NUM_FEATURES];
        if sum > 0 {
            for (share, &c) in shares.iter_mut().zip(counts.iter()) {
                *share = c as f64 / sum as f64;
            }
        }
        shares
    }

    /// Structural checks for forests loaded from disk
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    /// Majority vote; a tied vote goes to `Working`, the lowest class index
    fn predict(&self, features: &FeatureVector) -> HealthLabel {
        majority_class(&self.votes(features))
    }

    /// Mean of the per-tree leaf class fractions
    fn predict_proba(&self, features: &FeatureVector) -> [f64; NUM_CLASSES] {
        let x = features.to_array();
        let mut proba = [0.0; NUM_CLASSES];
        if self.trees.is_empty() {
            return proba;
        }
        for tree in &self.trees {
            for (p, t) in proba.iter_mut().zip(tree.predict_proba_array(&x)) {
                *p += t;
            }
        }
        for p in proba.iter_mut() {
            *p /= self.trees.len() as f64;
        }
        proba
    }
}

/// One seed per tree, drawn in order from a master RNG
fn derive_tree_seeds(seed: u64, n_trees: usize) -> Vec<u64> {
    let mut master = ChaCha8Rng::seed_from_u64(seed);
    (0..n_trees).map(|_| master.random::<u64>()).collect()
}
