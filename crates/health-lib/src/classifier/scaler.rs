//! Z-score feature scaling
//!
//! The classifier is only valid together with the exact parameters it was
//! trained against, so the parameters travel with the model in the bundle.

use crate::error::TrainingError;
use crate::models::{FeatureVector, NUM_FEATURES};
use serde::{Deserialize, Serialize};

/// Standard deviations at or below this fraction of the mean magnitude are
/// treated as zero variance
const MIN_RELATIVE_STD_DEV: f64 = 1e-12;

/// Fitted per-feature mean and standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub mean: [f64; NUM_FEATURES],
    /// Population standard deviation; constant features carry `1.0`
    pub std_dev: [f64; NUM_FEATURES],
    /// Features that had zero variance at fit time
    pub constant: [bool; NUM_FEATURES],
    /// Number of samples the parameters were fitted on
    pub samples: usize,
}

impl ScalerParameters {
    /// Apply `(x - mean) / std_dev` elementwise
    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let x = features.to_array();
        let mut out = [0.0; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            out[i] = (x[i] - self.mean[i]) / self.std_dev[i];
        }
        FeatureVector::from_array(out)
    }

    pub fn transform_batch(&self, features: &[FeatureVector]) -> Vec<FeatureVector> {
        features.iter().map(|f| self.transform(f)).collect()
    }

    /// Map scaled values back to raw units
    pub fn inverse_transform(&self, scaled: &FeatureVector) -> FeatureVector {
        let z = scaled.to_array();
        let mut out = [0.0; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            out[i] = z[i] * self.std_dev[i] + self.mean[i];
        }
        FeatureVector::from_array(out)
    }

    /// Indices of features that had zero variance at fit time
    pub fn constant_features(&self) -> Vec<usize> {
        (0..NUM_FEATURES).filter(|&i| self.constant[i]).collect()
    }

    /// Reject parameters that would divide by zero or produce non-finite output
    pub fn validate(&self) -> Result<(), String> {
        for i in 0..NUM_FEATURES {
            if !self.mean[i].is_finite() {
                return Err(format!("scaler mean for feature {} is not finite", i));
            }
            if !self.std_dev[i].is_finite() || self.std_dev[i] <= 0.0 {
                return Err(format!(
                    "scaler std_dev for feature {} is {}, expected a positive finite value",
                    i, self.std_dev[i]
                ));
            }
        }
        Ok(())
    }
}

/// Fits z-score parameters from a training partition
#[derive(Debug, Clone, Copy, Default)]
pub struct Scaler;

impl Scaler {
    /// Compute per-feature mean and population standard deviation.
    ///
    /// Features whose standard deviation is zero fall back to `1.0` and take
    /// the column's shared value as their mean, so a constant feature scales
    /// to exactly `0` instead of dividing by zero. Parameters that are not
    /// finite are rejected here rather than when the bundle is reloaded.
    pub fn fit(samples: &[FeatureVector]) -> Result<ScalerParameters, TrainingError> {
        if samples.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }
        let n = samples.len() as f64;
        let first = samples[0].to_array();

        // Dividing inside the sum keeps very large inputs from overflowing
        let mut mean = [0.0; NUM_FEATURES];
        for sample in samples {
            for (m, x) in mean.iter_mut().zip(sample.to_array()) {
                *m += x / n;
            }
        }

        // Deviations are squared relative to the largest one for the same reason
        let mut max_dev = [0.0_f64; NUM_FEATURES];
        for sample in samples {
            for (i, x) in sample.to_array().into_iter().enumerate() {
                max_dev[i] = max_dev[i].max((x - mean[i]).abs());
            }
        }
        let mut sum_sq = [0.0; NUM_FEATURES];
        for sample in samples {
            for (i, x) in sample.to_array().into_iter().enumerate() {
                if max_dev[i] > 0.0 {
                    sum_sq[i] += ((x - mean[i]) / max_dev[i]).powi(2);
                }
            }
        }

        let mut std_dev = [0.0; NUM_FEATURES];
        let mut constant = [false; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            std_dev[i] = max_dev[i] * (sum_sq[i] / n).sqrt();
            let identical = samples.iter().all(|s| s.to_array()[i] == first[i]);
            if identical || std_dev[i] <= MIN_RELATIVE_STD_DEV * mean[i].abs().max(1.0) {
                std_dev[i] = 1.0;
                constant[i] = true;
                if identical {
                    mean[i] = first[i];
                }
            }
        }

        let params = ScalerParameters {
            mean,
            std_dev,
            constant,
            samples: samples.len(),
        };
        params.validate().map_err(TrainingError::DegenerateScaler)?;
        Ok(params)
    }

    pub fn transform(features: &FeatureVector, params: &ScalerParameters) -> FeatureVector {
        params.transform(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: [f64; NUM_FEATURES]) -> FeatureVector {
        FeatureVector::from_array(values)
    }

    #[test]
    fn test_fit_mean_and_population_std() {
        let samples = vec![
            fv([2.0, 4.0, 10.0, 1.0, 0.0]),
            fv([4.0, 4.0, 10.0, 3.0, 0.0]),
            fv([6.0, 4.0, 10.0, 5.0, 0.0]),
            fv([8.0, 4.0, 10.0, 7.0, 0.0]),
        ];
        let params = Scaler::fit(&samples).unwrap();
        assert_eq!(params.mean[0], 5.0);
        assert!((params.std_dev[0] - 5.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(params.samples, 4);
    }

    #[test]
    fn test_zero_variance_feature_scales_to_zero() {
        let samples: Vec<_> = (0..10)
            .map(|i| fv([i as f64, 1000.0, 1000.0, i as f64 * 2.0, 5.0]))
            .collect();
        let params = Scaler::fit(&samples).unwrap();
        assert_eq!(params.std_dev[1], 1.0);
        assert_eq!(params.std_dev[4], 1.0);
        assert_eq!(params.constant_features(), vec![1, 2, 4]);

        for s in &samples {
            let scaled = params.transform(s);
            assert_eq!(scaled.mem_usage, 0.0);
            assert_eq!(scaled.mem_limit, 0.0);
            assert_eq!(scaled.pids, 0.0);
            assert!(scaled.is_finite());
        }
    }

    #[test]
    fn test_transform_is_idempotent_for_same_input() {
        let samples = vec![fv([1.0, 2.0, 3.0, 4.0, 5.0]), fv([3.0, 1.0, 7.0, 0.0, 9.0])];
        let params = Scaler::fit(&samples).unwrap();
        let x = fv([2.5, 1.5, 4.0, 2.0, 6.0]);
        let first = Scaler::transform(&x, &params);
        let second = Scaler::transform(&x, &params);
        assert_eq!(first, second);
        assert_eq!(params, Scaler::fit(&samples).unwrap());
    }

    #[test]
    fn test_scaled_training_data_is_standardized() {
        let samples: Vec<_> = (0..50)
            .map(|i| fv([i as f64, (i * i) as f64, 1.0, -(i as f64), (i % 7) as f64]))
            .collect();
        let params = Scaler::fit(&samples).unwrap();
        let scaled = params.transform_batch(&samples);
        for dim in [0usize, 1, 3, 4] {
            let mean: f64 = scaled.iter().map(|v| v.to_array()[dim]).sum::<f64>() / 50.0;
            let var: f64 = scaled
                .iter()
                .map(|v| (v.to_array()[dim] - mean).powi(2))
                .sum::<f64>()
                / 50.0;
            assert!(mean.abs() < 1e-9, "dim {} mean {}", dim, mean);
            assert!((var - 1.0).abs() < 1e-9, "dim {} var {}", dim, var);
        }
    }

    #[test]
    fn test_inverse_transform() {
        let samples = vec![fv([1.0, 2.0, 3.0, 4.0, 5.0]), fv([3.0, 6.0, 9.0, 0.0, 1.0])];
        let params = Scaler::fit(&samples).unwrap();
        let x = fv([2.0, 5.0, 4.0, 1.0, 3.0]);
        let back = params.inverse_transform(&params.transform(&x));
        for (a, b) in back.to_array().iter().zip(x.to_array()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert!(matches!(Scaler::fit(&[]), Err(TrainingError::EmptyCorpus)));
    }

    #[test]
    fn test_inexact_constant_column_scales_to_exact_zero() {
        let samples: Vec<_> = (0..10)
            .map(|i| fv([i as f64, 0.1, 0.1, 0.1, 0.1]))
            .collect();
        let params = Scaler::fit(&samples).unwrap();
        assert_eq!(params.constant_features(), vec![1, 2, 3, 4]);
        assert_eq!(params.mean[1], 0.1);

        for s in &samples {
            let scaled = params.transform(s);
            assert_eq!(scaled.mem_usage, 0.0);
            assert_eq!(scaled.mem_limit, 0.0);
            assert_eq!(scaled.mem_perc, 0.0);
            assert_eq!(scaled.pids, 0.0);
        }
    }

    #[test]
    fn test_large_finite_values_fit_without_overflow() {
        let samples: Vec<_> = (1..=20)
            .map(|k| fv([1.0, 2.0, 3.0, 4.0, k as f64 * 1e200]))
            .collect();
        let params = Scaler::fit(&samples).unwrap();
        assert!(params.validate().is_ok());
        assert!(params.std_dev[4].is_finite() && params.std_dev[4] > 0.0);
        assert!(params.transform(&samples[0]).is_finite());
    }

    #[test]
    fn test_non_finite_parameters_rejected_at_fit() {
        let samples = vec![
            fv([f64::MAX, 0.0, 0.0, 0.0, 0.0]),
            fv([f64::MAX, 0.0, 0.0, 0.0, 0.0]),
            fv([-f64::MAX, 0.0, 0.0, 0.0, 0.0]),
        ];
        assert!(matches!(
            Scaler::fit(&samples),
            Err(TrainingError::DegenerateScaler(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_std() {
        let mut params = Scaler::fit(&[fv([1.0; NUM_FEATURES])]).unwrap();
        assert!(params.validate().is_ok());
        params.std_dev[3] = 0.0;
        assert!(params.validate().is_err());
    }
}
