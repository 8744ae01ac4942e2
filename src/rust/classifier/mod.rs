use serde::{Deserialize, Serialize};

mod error;
mod model;
mod persist;
mod stats;
mod trainer;
pub mod builder;

pub use error::ClassifierError;
pub use model::{ClassPair, Classifier, Prediction, TrainedClass};
pub use builder::ClassifierBuilder;
pub use stats::ClassStatistics;

/// Information about the current state of a trained classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierInfo {
    /// Number of classes the classifier was trained on
    pub num_classes: usize,
    /// Labels of the classes, in index order
    pub class_labels: Vec<String>,
    /// Length of the feature vectors
    pub nfeatures: usize,
    /// Training examples per class; `None` for a classifier loaded from disk
    pub example_counts: Vec<Option<usize>>,
    /// Features dropped because they made the pooled covariance singular
    pub ignored_features: Vec<usize>,
}
