use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use crate::config::TrainingConfig;
use crate::linalg::mahalanobis_distance;

/// A class of a trained classifier: its mean together with the weight vector
/// and constant of its discriminant function.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedClass {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) mean: Array1<f64>,
    pub(crate) weight: Array1<f64>,
    pub(crate) constant: f64,
    pub(crate) example_count: Option<usize>,
}

impl TrainedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn weight(&self) -> &Array1<f64> {
        &self.weight
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Number of training examples, unknown for a classifier loaded from disk.
    pub fn example_count(&self) -> Option<usize> {
        self.example_count
    }

    fn score(&self, features: ArrayView1<f64>) -> f64 {
        self.weight.dot(&features) + self.constant
    }
}

/// Outcome of classifying one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Name of the chosen class
    pub label: String,
    /// Index of the chosen class
    pub index: usize,
    /// Discriminant value of every class, in index order
    pub scores: Vec<f64>,
    /// Probability that the choice is unambiguous, in `(0, 1]`
    pub confidence: Option<f64>,
    /// Mahalanobis distance from the input to the chosen class's mean
    pub distance: Option<f64>,
}

/// Two classes and the Mahalanobis distance between their means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPair {
    pub first: String,
    pub second: String,
    pub distance: f64,
}

impl ClassPair {
    /// Separation expressed in standard deviations of the pooled covariance.
    pub fn standard_deviations(&self) -> f64 {
        self.distance.sqrt()
    }
}

/// A trained linear-discriminant classifier.
///
/// Produced by [`ClassifierBuilder::train`](super::ClassifierBuilder::train)
/// or [`Classifier::load`]. It is never mutated afterwards, so it can be
/// shared across threads behind an `Arc`:
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use gesture_classifier::Classifier;
/// use std::sync::Arc;
/// use std::thread;
///
/// let mut builder = Classifier::builder();
/// for x in [[0.0, 0.0], [1.0, 0.5], [0.5, 1.0]] {
///     builder.add_example("low", &x)?;
/// }
/// for x in [[9.0, 9.5], [10.0, 10.0], [9.5, 9.0]] {
///     builder.add_example("high", &x)?;
/// }
/// let classifier = Arc::new(builder.train()?);
///
/// let shared = Arc::clone(&classifier);
/// let label = thread::spawn(move || shared.classify(&[9.8, 9.7]).map(|p| p.label))
///     .join()
///     .unwrap()?;
/// assert_eq!(label, "high");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Classifier {
    pub(crate) nfeatures: usize,
    pub(crate) classes: Vec<TrainedClass>,
    pub(crate) inverse_covariance: Array2<f64>,
    pub(crate) config: TrainingConfig,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder to accumulate training examples
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Replaces the configuration used at classification time.
    ///
    /// # Errors
    /// - `ValidationError` if the configuration is invalid, for instance a
    ///   positive or NaN ambiguity cutoff
    pub fn with_config(mut self, config: TrainingConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        let example_counts = self.classes.iter().map(TrainedClass::example_count).collect();
        super::ClassifierInfo {
            num_classes: self.classes.len(),
            class_labels: self.classes.iter().map(|c| c.name.clone()).collect(),
            nfeatures: self.nfeatures,
            example_counts,
            ignored_features: self.ignored_features(),
        }
    }

    pub fn nfeatures(&self) -> usize {
        self.nfeatures
    }

    pub fn classes(&self) -> &[TrainedClass] {
        &self.classes
    }

    pub fn class(&self, index: usize) -> Option<&TrainedClass> {
        self.classes.get(index)
    }

    pub fn lookup_class(&self, name: &str) -> Option<&TrainedClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Shared inverse covariance. Rows and columns of features dropped during
    /// training are zero.
    pub fn inverse_covariance(&self) -> &Array2<f64> {
        &self.inverse_covariance
    }

    /// Features that training had to ignore because they made the pooled
    /// covariance singular.
    pub fn ignored_features(&self) -> Vec<usize> {
        (0..self.nfeatures)
            .filter(|&i| {
                self.inverse_covariance.row(i).iter().all(|&v| v == 0.0)
                    && self.inverse_covariance.column(i).iter().all(|&v| v == 0.0)
            })
            .collect()
    }

    /// Picks the class whose discriminant function is largest for `features`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the vector length differs from the training data
    /// - `ValidationError` if any feature is not finite
    pub fn classify(&self, features: &[f64]) -> Result<Prediction, ClassifierError> {
        self.evaluate(features, false)
    }

    /// Like [`classify`](Self::classify), additionally computing the
    /// probability of non-ambiguity and the distance to the chosen class mean.
    ///
    /// A low confidence means another class scored nearly as well; a large
    /// distance means the input looks like none of the training examples.
    pub fn classify_with_metrics(&self, features: &[f64]) -> Result<Prediction, ClassifierError> {
        self.evaluate(features, true)
    }

    fn evaluate(&self, features: &[f64], with_metrics: bool) -> Result<Prediction, ClassifierError> {
        if features.len() != self.nfeatures {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.nfeatures,
                actual: features.len(),
            });
        }
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::ValidationError(format!(
                "Feature {} is not a finite number",
                pos
            )));
        }

        let x = ArrayView1::from(features);
        let scores: Vec<f64> = self.classes.iter().map(|c| c.score(x)).collect();

        // strict comparison: ties go to the lowest index
        let best = (1..scores.len()).fold(0, |best, i| if scores[i] > scores[best] { i } else { best });
        let chosen = &self.classes[best];

        let (confidence, distance) = if with_metrics {
            (
                Some(self.non_ambiguity(&scores, best)),
                Some(mahalanobis_distance(x, chosen.mean.view(), self.inverse_covariance.view())),
            )
        } else {
            (None, None)
        };

        Ok(Prediction {
            label: chosen.name.clone(),
            index: best,
            scores,
            confidence,
            distance,
        })
    }

    fn non_ambiguity(&self, scores: &[f64], best: usize) -> f64 {
        let top = scores[best];
        let rivals: f64 = scores
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != best)
            .map(|(_, &s)| s - top)
            .filter(|&gap| gap > self.config.ambiguity_cutoff)
            .map(f64::exp)
            .sum();
        // the chosen class always contributes exp(0)
        let denom = 1.0 + rivals;
        if denom.is_finite() && denom >= 1.0 {
            1.0 / denom
        } else {
            1.0
        }
    }

    /// Reports up to `k` pairs of classes whose means are closest under the
    /// shared covariance, nearest first. These are the likely confusions.
    pub fn closest_pairs(&self, k: usize) -> Vec<ClassPair> {
        let mut distances = Vec::new();
        for (i, a) in self.classes.iter().enumerate() {
            for b in &self.classes[i + 1..] {
                let d = mahalanobis_distance(a.mean.view(), b.mean.view(), self.inverse_covariance.view());
                distances.push((a, b, d));
            }
        }

        let mut consumed = vec![false; distances.len()];
        let mut report = Vec::with_capacity(k.min(distances.len()));
        for _ in 0..k {
            let next = distances
                .iter()
                .enumerate()
                .filter(|(i, _)| !consumed[*i])
                .min_by(|(_, x), (_, y)| x.2.total_cmp(&y.2))
                .map(|(i, _)| i);
            let Some(i) = next else { break };
            consumed[i] = true;

            let (a, b, d) = distances[i];
            report.push(ClassPair {
                first: a.name.clone(),
                second: b.name.clone(),
                distance: d,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fixed_classifier() -> Classifier {
        // identity covariance: discriminants reduce to nearest Euclidean mean
        let inverse_covariance: Array2<f64> = Array2::eye(2);
        let means = [("left", array![-1.0, 0.0]), ("right", array![1.0, 0.0]), ("far", array![0.0, 5.0])];
        let classes = means
            .into_iter()
            .enumerate()
            .map(|(index, (name, mean))| {
                let weight = inverse_covariance.dot(&mean);
                let constant = -0.5 * weight.dot(&mean);
                TrainedClass { name: name.into(), index, mean, weight, constant, example_count: Some(3) }
            })
            .collect();
        Classifier { nfeatures: 2, classes, inverse_covariance, config: TrainingConfig::default() }
    }

    #[test]
    fn test_classify_nearest_mean() -> Result<(), ClassifierError> {
        let classifier = fixed_classifier();
        assert_eq!(classifier.classify(&[-0.8, 0.1])?.label, "left");
        assert_eq!(classifier.classify(&[0.9, -0.3])?.label, "right");
        assert_eq!(classifier.classify(&[0.0, 4.0])?.label, "far");
        Ok(())
    }

    #[test]
    fn test_ties_go_to_lowest_index() -> Result<(), ClassifierError> {
        let classifier = fixed_classifier();
        let prediction = classifier.classify_with_metrics(&[0.0, 0.0])?;
        assert_eq!(prediction.index, 0);
        assert_eq!(prediction.scores[0], prediction.scores[1]);
        let confidence = prediction.confidence.unwrap();
        assert!(confidence > 0.49 && confidence <= 0.5);
        Ok(())
    }

    #[test]
    fn test_classify_without_metrics() -> Result<(), ClassifierError> {
        let prediction = fixed_classifier().classify(&[1.0, 0.0])?;
        assert!(prediction.confidence.is_none());
        assert!(prediction.distance.is_none());
        assert_eq!(prediction.scores.len(), 3);
        Ok(())
    }

    #[test]
    fn test_distance_is_squared_euclidean_under_identity() -> Result<(), ClassifierError> {
        let prediction = fixed_classifier().classify_with_metrics(&[1.0, 2.0])?;
        assert_eq!(prediction.label, "right");
        assert_eq!(prediction.distance, Some(4.0));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_input() {
        let classifier = fixed_classifier();
        assert!(matches!(
            classifier.classify(&[1.0]),
            Err(ClassifierError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            classifier.classify(&[f64::NAN, 0.0]),
            Err(ClassifierError::ValidationError(_))
        ));
    }

    #[test]
    fn test_confidence_with_overflowing_scores() -> Result<(), ClassifierError> {
        let classifier = fixed_classifier();
        let prediction = classifier.classify_with_metrics(&[1e308, 1e308])?;
        assert_eq!(prediction.label, "far");
        assert_eq!(prediction.scores[2], f64::INFINITY);
        assert_eq!(prediction.confidence, Some(1.0));

        let prediction = classifier.classify_with_metrics(&[-1e308, f64::MAX])?;
        let confidence = prediction.confidence.unwrap();
        assert!(confidence > 0.0 && confidence <= 1.0);
        Ok(())
    }

    #[test]
    fn test_with_config_is_validated() -> Result<(), ClassifierError> {
        let positive = TrainingConfig { ambiguity_cutoff: 1.0, ..Default::default() };
        assert!(matches!(
            fixed_classifier().with_config(positive),
            Err(ClassifierError::ValidationError(_))
        ));
        let nan = TrainingConfig { ambiguity_cutoff: f64::NAN, ..Default::default() };
        assert!(fixed_classifier().with_config(nan).is_err());

        // a zero cutoff leaves even an exact tie out of the sum
        let strict = fixed_classifier().with_config(TrainingConfig { ambiguity_cutoff: 0.0, ..Default::default() })?;
        assert_eq!(strict.classify_with_metrics(&[0.0, 0.0])?.confidence, Some(1.0));
        Ok(())
    }

    #[test]
    fn test_closest_pairs() {
        let classifier = fixed_classifier();
        let pairs = classifier.closest_pairs(5);
        assert_eq!(pairs.len(), 3);
        assert_eq!((pairs[0].first.as_str(), pairs[0].second.as_str()), ("left", "right"));
        assert_eq!(pairs[0].distance, 4.0);
        assert_eq!(pairs[0].standard_deviations(), 2.0);
        assert_eq!(pairs[1].distance, 26.0);
        assert_eq!(pairs[2].distance, 26.0);

        assert_eq!(classifier.closest_pairs(1).len(), 1);
        assert!(classifier.closest_pairs(0).is_empty());
    }

    #[test]
    fn test_info() {
        let info = fixed_classifier().info();
        assert_eq!(info.num_classes, 3);
        assert_eq!(info.class_labels, vec!["left", "right", "far"]);
        assert_eq!(info.example_counts, vec![Some(3), Some(3), Some(3)]);
        assert!(info.ignored_features.is_empty());
    }
}
