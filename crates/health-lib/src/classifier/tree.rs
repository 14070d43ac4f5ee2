//! CART decision tree with Gini impurity
//!
//! Trees are stored as a flat node arena with the root at index 0. Children
//! are always pushed after their parent, so child indices are strictly
//! greater than the parent index; `validate` relies on this to rule out
//! cycles in a loaded model.

use super::Classifier;
use crate::models::{FeatureVector, HealthLabel, NUM_CLASSES, NUM_FEATURES};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0
    pub max_depth: usize,
    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,
    /// Each child of a split must keep at least this many samples
    pub min_samples_leaf: usize,
    /// Features examined per split before settling for the best found
    pub max_features: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 24,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: NUM_FEATURES,
        }
    }
}

/// A node in the tree arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Samples with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Fraction of training samples per class at this leaf
        distribution: [f64; NUM_CLASSES],
        /// Majority class, ties resolved to the lowest class index
        class: HealthLabel,
        samples: usize,
    },
}

/// A single trained decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree over the rows selected by `indices`.
    ///
    /// `indices` may contain repeats (bootstrap draws). The RNG only drives
    /// the feature order examined at each node.
    pub fn fit<R: Rng + ?Sized>(
        features: &[[f64; NUM_FEATURES]],
        labels: &[HealthLabel],
        indices: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = TreeBuilder {
            features,
            labels,
            params: TreeParams {
                min_samples_leaf: params.min_samples_leaf.max(1),
                max_features: params.max_features.clamp(1, NUM_FEATURES),
                ..*params
            },
            rng,
            nodes: Vec::new(),
        };
        builder.build(indices, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Walk from the root to the leaf responsible for `x`
    fn leaf(&self, x: &[f64; NUM_FEATURES]) -> &Node {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                leaf @ Node::Leaf { .. } => return leaf,
            }
        }
    }

    pub fn predict_array(&self, x: &[f64; NUM_FEATURES]) -> HealthLabel {
        match self.leaf(x) {
            Node::Leaf { class, .. } => *class,
            Node::Split { .. } => unreachable!("leaf() only returns leaves"),
        }
    }

    pub fn predict_proba_array(&self, x: &[f64; NUM_FEATURES]) -> [f64; NUM_CLASSES] {
        match self.leaf(x) {
            Node::Leaf { distribution, .. } => *distribution,
            Node::Split { .. } => unreachable!("leaf() only returns leaves"),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a single-leaf tree has depth 0)
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                let child_depth = depths[idx] + 1;
                depths[*left] = child_depth;
                depths[*right] = child_depth;
                max_depth = max_depth.max(child_depth);
            }
        }
        max_depth
    }

    /// Number of splits on each feature
    pub fn split_counts(&self) -> [usize; NUM_FEATURES] {
        let mut counts = [0; NUM_FEATURES];
        for node in &self.nodes {
            if let Node::Split { feature, .. } = node {
                counts[*feature] += 1;
            }
        }
        counts
    }

    /// Structural checks for trees loaded from disk
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= NUM_FEATURES {
                        return Err(format!("node {} splits on unknown feature {}", idx, feature));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {} has a NaN threshold", idx));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child index {}", idx, child));
                        }
                    }
                }
                Node::Leaf { distribution, .. } => {
                    if distribution.iter().any(|p| !p.is_finite() || *p < 0.0) {
                        return Err(format!("leaf {} has an invalid class distribution", idx));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Classifier for DecisionTree {
    fn predict(&self, features: &FeatureVector) -> HealthLabel {
        self.predict_array(&features.to_array())
    }

    fn predict_proba(&self, features: &FeatureVector) -> [f64; NUM_CLASSES] {
        self.predict_proba_array(&features.to_array())
    }
}

struct TreeBuilder<'a, R: ?Sized> {
    features: &'a [[f64; NUM_FEATURES]],
    labels: &'a [HealthLabel],
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

impl<'a, R: Rng + ?Sized> TreeBuilder<'a, R> {
    /// Grow the subtree for `indices` and return its node index
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&indices);
        let occupied = counts.iter().filter(|&&c| c > 0).count();

        if occupied <= 1
            || indices.len() < self.params.min_samples_split
            || depth >= self.params.max_depth
        {
            return self.push_leaf(counts);
        }

        let Some(split) = self.best_split(&indices) else {
            return self.push_leaf(counts);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][split.feature] <= split.threshold);

        let node_id = self.nodes.len();
        self.nodes.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left_id = self.build(left_rows, depth + 1);
        let right_id = self.build(right_rows, depth + 1);
        if let Node::Split { left, right, .. } = &mut self.nodes[node_id] {
            *left = left_id;
            *right = right_id;
        }
        node_id
    }

    fn class_counts(&self, indices: &[usize]) -> [usize; NUM_CLASSES] {
        let mut counts = [0; NUM_CLASSES];
        for &i in indices {
            counts[self.labels[i].index()] += 1;
        }
        counts
    }

    fn push_leaf(&mut self, counts: [usize; NUM_CLASSES]) -> usize {
        let total: usize = counts.iter().sum();
        let mut distribution = [0.0; NUM_CLASSES];
        if total > 0 {
            for (p, &c) in distribution.iter_mut().zip(counts.iter()) {
                *p = c as f64 / total as f64;
            }
        }
        self.nodes.push(Node::Leaf {
            distribution,
            class: majority_class(&counts),
            samples: total,
        });
        self.nodes.len() - 1
    }

    /// Examine features in random order, `max_features` at a time.
    ///
    /// If none of the first `max_features` admits a valid split the search
    /// keeps going through the remaining features.
    fn best_split(&mut self, indices: &[usize]) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..NUM_FEATURES).collect();
        order.shuffle(&mut *self.rng);

        let mut best: Option<SplitCandidate> = None;
        for (examined, &feature) in order.iter().enumerate() {
            if examined >= self.params.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_threshold(indices, feature) {
                if best.map_or(true, |b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Sweep the sorted values of one feature and return the threshold with
    /// the lowest size-weighted Gini impurity
    fn best_threshold(&self, indices: &[usize], feature: usize) -> Option<SplitCandidate> {
        let mut column: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.features[i][feature], self.labels[i].index()))
            .collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = column.len();
        let mut total = [0usize; NUM_CLASSES];
        for &(_, class) in &column {
            total[class] += 1;
        }

        let min_leaf = self.params.min_samples_leaf;
        let mut left = [0usize; NUM_CLASSES];
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n.saturating_sub(1) {
            left[column[pos].1] += 1;
            let (value, next) = (column[pos].0, column[pos + 1].0);
            if value == next {
                continue;
            }

            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let mut right = [0usize; NUM_CLASSES];
            for c in 0..NUM_CLASSES {
                right[c] = total[c] - left[c];
            }
            let impurity = (left_n as f64 * gini(&left, left_n)
                + right_n as f64 * gini(&right, right_n))
                / n as f64;

            if best.map_or(true, |b| impurity < b.impurity) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: midpoint(value, next),
                    impurity,
                });
            }
        }
        best
    }
}

/// Gini impurity `1 - sum(p_c^2)` of a class count vector
pub fn gini(counts: &[usize; NUM_CLASSES], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Class with the most votes; ties go to the lowest class index
pub fn majority_class(counts: &[usize; NUM_CLASSES]) -> HealthLabel {
    let mut best = 0;
    for (idx, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = idx;
        }
    }
    HealthLabel::from_index(best).unwrap_or(HealthLabel::Working)
}

/// Threshold between two distinct sorted values such that `low <= t < high`
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high || !mid.is_finite() {
        low
    } else {
        mid
    }
}
