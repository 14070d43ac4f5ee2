//! Feature encoding, scaling and the tree ensemble

mod features;
mod forest;
mod scaler;
mod tree;

pub use features::{FeatureCodec, FieldError};
pub use forest::{ForestConfig, RandomForest};
pub use scaler::{Scaler, ScalerParameters};
pub use tree::{gini, majority_class, DecisionTree, Node, TreeParams};

use crate::models::{FeatureVector, HealthLabel, NUM_CLASSES};

/// Trait for trained health classifiers operating on scaled features
pub trait Classifier: Send + Sync {
    /// Predict the health label of a scaled feature vector
    fn predict(&self, features: &FeatureVector) -> HealthLabel;

    /// Class probabilities indexed by `HealthLabel::index`
    fn predict_proba(&self, features: &FeatureVector) -> [f64; NUM_CLASSES];
}
