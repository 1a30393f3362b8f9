//! Isolation-forest outlier detection
//!
//! Points are isolated by random recursive partitioning: each tree splits
//! a node at a uniform random value between the node's minimum and maximum.
//! Values that need fewer splits to isolate get higher anomaly scores.
//! The decision threshold is derived from the training scores and the
//! configured contamination (expected anomaly fraction).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Expected fraction of anomalies in the training data
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Seed dataset used when no training data is configured
pub const DEFAULT_TRAINING_DATA: [f64; 7] = [50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 110.0];

/// Default forest size
pub const DEFAULT_TREES: usize = 100;
/// Default per-tree subsample cap
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Classification of a scored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Normal,
    Anomalous,
}

impl Verdict {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, Verdict::Anomalous)
    }
}

/// Isolation forest parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Expected anomaly fraction, in (0, 0.5]
    pub contamination: f64,
    /// Number of isolation trees
    pub n_trees: usize,
    /// Upper bound on the per-tree subsample size
    pub max_samples: usize,
    /// Random seed for reproducible forests
    pub seed: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            n_trees: DEFAULT_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed: None,
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<(), TrainingError> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(TrainingError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_trees == 0 {
            return Err(TrainingError::InvalidParameter(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if self.max_samples < 2 {
            return Err(TrainingError::InvalidParameter(
                "max_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trains isolation forests from seed data
#[derive(Debug, Clone, Default)]
pub struct OutlierDetector {
    config: DetectorConfig,
}

impl OutlierDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Train a model on the given seed values
    pub fn train(&self, seed: &[f64]) -> Result<DetectorModel, TrainingError> {
        self.config.validate()?;

        if seed.len() < 2 {
            return Err(TrainingError::InsufficientData { got: seed.len() });
        }
        if let Some(index) = seed.iter().position(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite { index });
        }

        let mut rng = match self.config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let subsample = self.config.max_samples.min(seed.len());
        let max_depth = (subsample as f64).log2().ceil() as usize;

        let trees = (0..self.config.n_trees)
            .map(|_| {
                let values: Vec<f64> = rand::seq::index::sample(&mut rng, seed.len(), subsample)
                    .iter()
                    .map(|i| seed[i])
                    .collect();
                grow(values, 0, max_depth, &mut rng)
            })
            .collect();

        let mut model = DetectorModel {
            trees,
            subsample,
            threshold: f64::INFINITY,
            contamination: self.config.contamination,
        };

        let mut training_scores: Vec<f64> = seed.iter().map(|v| model.anomaly_score(*v)).collect();
        training_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        model.threshold = quantile(&training_scores, 1.0 - self.config.contamination);

        Ok(model)
    }
}

/// Trained isolation forest. Immutable once trained.
#[derive(Debug, Clone)]
pub struct DetectorModel {
    trees: Vec<Node>,
    subsample: usize,
    threshold: f64,
    contamination: f64,
}

impl DetectorModel {
    /// Anomaly score in (0, 1]; higher is more anomalous
    pub fn anomaly_score(&self, value: f64) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(value)).sum();
        let mean = total / self.trees.len() as f64;
        2f64.powf(-mean / average_path_length(self.subsample))
    }

    /// Classify a value against the trained threshold
    pub fn score(&self, value: f64) -> Verdict {
        if self.anomaly_score(value) > self.threshold {
            Verdict::Anomalous
        } else {
            Verdict::Normal
        }
    }

    /// Score above which values are anomalous
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        at: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn path_length(&self, value: f64) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split { at, left, right } => {
                    node = if value < *at { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow(values: Vec<f64>, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || values.len() <= 1 {
        return Node::Leaf { size: values.len() };
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if max <= min {
        return Node::Leaf { size: values.len() };
    }

    let at = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = values.into_iter().partition(|v| *v < at);

    Node::Split {
        at,
        left: Box::new(grow(left, depth + 1, max_depth, rng)),
        right: Box::new(grow(right, depth + 1, max_depth, rng)),
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> OutlierDetector {
        OutlierDetector::new(DetectorConfig {
            seed: Some(seed),
            ..DetectorConfig::default()
        })
    }

    #[test]
    fn test_train_requires_two_points() {
        let detector = OutlierDetector::default();

        assert!(matches!(
            detector.train(&[]),
            Err(TrainingError::InsufficientData { got: 0 })
        ));
        assert!(matches!(
            detector.train(&[42.0]),
            Err(TrainingError::InsufficientData { got: 1 })
        ));
        assert!(detector.train(&[42.0, 43.0]).is_ok());
    }

    #[test]
    fn test_train_rejects_non_finite() {
        let result = OutlierDetector::default().train(&[1.0, f64::NAN, 3.0]);
        assert!(matches!(result, Err(TrainingError::NonFinite { index: 1 })));
    }

    #[test]
    fn test_invalid_contamination() {
        let detector = OutlierDetector::new(DetectorConfig {
            contamination: 0.0,
            ..DetectorConfig::default()
        });
        assert!(matches!(
            detector.train(&DEFAULT_TRAINING_DATA),
            Err(TrainingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_out_of_range_value_flagged_more_often() {
        let mut far_anomalies = 0;
        let mut near_anomalies = 0;

        for trial in 0..200 {
            let model = seeded(trial).train(&DEFAULT_TRAINING_DATA).unwrap();
            if model.score(1000.0).is_anomalous() {
                far_anomalies += 1;
            }
            if model.score(75.0).is_anomalous() {
                near_anomalies += 1;
            }
        }

        assert!(far_anomalies > 0);
        assert!(
            far_anomalies > near_anomalies,
            "1000 flagged {} times, 75 flagged {} times",
            far_anomalies,
            near_anomalies
        );
    }

    #[test]
    fn test_center_of_dense_data_is_normal() {
        let data: Vec<f64> = (80..=100).map(f64::from).collect();
        let model = seeded(7).train(&data).unwrap();

        assert_eq!(model.score(90.0), Verdict::Normal);
        assert!(model.anomaly_score(90.0) < model.anomaly_score(500.0));
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let a = seeded(42).train(&DEFAULT_TRAINING_DATA).unwrap();
        let b = seeded(42).train(&DEFAULT_TRAINING_DATA).unwrap();

        for value in [0.0, 55.0, 75.0, 110.0, 1000.0] {
            assert_eq!(a.anomaly_score(value), b.anomaly_score(value));
        }
        assert_eq!(a.threshold(), b.threshold());
    }

    #[test]
    fn test_scores_in_unit_interval() {
        let model = seeded(1).train(&DEFAULT_TRAINING_DATA).unwrap();
        assert_eq!(model.tree_count(), 100);

        for value in [-50.0, 50.0, 80.0, 110.0, 1e6] {
            let score = model.anomaly_score(value);
            assert!(score > 0.0 && score <= 1.0, "score {} out of range", score);
        }
    }

    #[test]
    fn test_constant_data_trains() {
        let model = seeded(3).train(&[5.0, 5.0, 5.0]).unwrap();
        // Every tree is a single leaf, so all values share one score
        assert_eq!(model.score(5.0), Verdict::Normal);
        assert_eq!(model.score(500.0), Verdict::Normal);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(7));
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(quantile(&sorted, 0.0), 0.0);
        assert_eq!(quantile(&sorted, 1.0), 30.0);
        assert!((quantile(&sorted, 0.5) - 15.0).abs() < 1e-9);
    }
}
