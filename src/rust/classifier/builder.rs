use log::{debug, info, warn};

use super::error::ClassifierError;
use super::model::{Classifier, TrainedClass};
use super::stats::ClassStatistics;
use super::trainer;
use crate::config::TrainingConfig;

/// Accumulates labeled feature vectors and trains a [`Classifier`] from them.
///
/// The builder is the accumulating half of a classifier's life: examples can
/// be added until [`train`](Self::train) produces the immutable trained
/// classifier. Training borrows the builder, so a failed attempt (for
/// instance with too few examples) leaves it ready for more data.
#[derive(Default, Debug, Clone)]
pub struct ClassifierBuilder {
    nfeatures: Option<usize>,
    classes: Vec<ClassStatistics>,
    config: TrainingConfig,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use gesture_classifier::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// assert!(builder.classes().is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            nfeatures: None,
            classes: Vec::new(),
            config: TrainingConfig::default(),
        }
    }

    /// Sets the numeric configuration used for training and carried into the
    /// trained classifier
    ///
    /// # Example
    /// ```
    /// use gesture_classifier::{ClassifierBuilder, TrainingConfig};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_config(TrainingConfig { singularity_epsilon: 1e-9, ..Default::default() });
    /// ```
    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of features per example, fixed by the first accepted example
    pub fn nfeatures(&self) -> Option<usize> {
        self.nfeatures
    }

    /// Classes in registration order
    pub fn classes(&self) -> &[ClassStatistics] {
        &self.classes
    }

    /// Statistics of the class called `name`, if it has been registered
    pub fn lookup_class(&self, name: &str) -> Option<&ClassStatistics> {
        self.classes.iter().find(|c| c.name() == name)
    }

    /// Validates an example according to the following rules:
    /// - Class name must not be empty and must not contain line breaks
    /// - Feature vector must not be empty
    /// - Every feature must be a finite number
    fn validate_example(class_name: &str, features: &[f64]) -> Result<(), ClassifierError> {
        if class_name.is_empty() {
            return Err(ClassifierError::ValidationError("Class name cannot be empty".into()));
        }
        if class_name.contains(|c: char| c == '\n' || c == '\r') {
            return Err(ClassifierError::ValidationError(format!(
                "Class name {:?} cannot contain line breaks",
                class_name
            )));
        }
        if features.is_empty() {
            return Err(ClassifierError::ValidationError("Feature vector cannot be empty".into()));
        }
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::ValidationError(format!(
                "Feature {} of class '{}' is not a finite number",
                pos, class_name
            )));
        }
        Ok(())
    }

    /// Adds one training example, registering `class_name` if it is new
    ///
    /// The first example fixes the number of features. A vector of any other
    /// length is logged and rejected with `DimensionMismatch`; nothing about
    /// the builder changes, so a loading loop can simply carry on.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the vector length differs from earlier examples
    /// - `ValidationError` if the class name or a feature value is invalid
    /// - `ValidationError` if the maximum number of classes is exceeded
    ///
    /// # Example
    /// ```
    /// use gesture_classifier::{ClassifierBuilder, ClassifierError};
    ///
    /// let mut builder = ClassifierBuilder::new();
    /// builder.add_example("circle", &[1.0, 2.0, 3.0]).unwrap();
    /// let err = builder.add_example("circle", &[1.0, 2.0]).unwrap_err();
    /// assert!(matches!(err, ClassifierError::DimensionMismatch { expected: 3, actual: 2 }));
    /// assert_eq!(builder.lookup_class("circle").unwrap().example_count(), 1);
    /// ```
    pub fn add_example(&mut self, class_name: &str, features: &[f64]) -> Result<(), ClassifierError> {
        Self::validate_example(class_name, features)?;

        if let Some(expected) = self.nfeatures {
            if features.len() != expected {
                warn!(
                    "Rejecting example for class '{}': {} features, expected {}",
                    class_name,
                    features.len(),
                    expected
                );
                return Err(ClassifierError::DimensionMismatch { expected, actual: features.len() });
            }
        }

        let position = match self.classes.iter().position(|c| c.name() == class_name) {
            Some(position) => position,
            None => self.register_class(class_name, features.len())?,
        };
        self.nfeatures.get_or_insert(features.len());
        self.classes[position].fold(features);
        Ok(())
    }

    /// Adds several examples of one class
    ///
    /// Rejected examples are logged and skipped, exactly as a loading loop
    /// over [`add_example`](Self::add_example) would; the accepted ones and
    /// everything already in the builder are kept.
    ///
    /// # Example
    /// ```
    /// use gesture_classifier::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_examples("tap", vec![vec![0.0, 0.1], vec![0.1, 0.0]])
    ///     .with_examples("swipe", vec![vec![5.0, 0.2], vec![5.5], vec![5.5, -0.1]]);
    /// assert_eq!(builder.classes().len(), 2);
    /// assert_eq!(builder.lookup_class("swipe").unwrap().example_count(), 2);
    /// ```
    pub fn with_examples<I, V>(mut self, class_name: &str, examples: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[f64]>,
    {
        for example in examples {
            match self.add_example(class_name, example.as_ref()) {
                Ok(()) => {}
                // already logged by add_example
                Err(ClassifierError::DimensionMismatch { .. }) => {}
                Err(e) => warn!("Skipping example for class '{}': {}", class_name, e),
            }
        }
        self
    }

    fn register_class(&mut self, class_name: &str, nfeatures: usize) -> Result<usize, ClassifierError> {
        if self.classes.len() >= self.config.max_classes {
            return Err(ClassifierError::ValidationError(format!(
                "Maximum number of classes ({}) exceeded",
                self.config.max_classes
            )));
        }
        let index = self.classes.len();
        debug!("Registering class '{}' with index {}", class_name, index);
        self.classes.push(ClassStatistics::new(class_name, index, nfeatures));
        Ok(index)
    }

    /// Pools the per-class statistics and derives the discriminant functions
    ///
    /// # Returns
    /// * `Result<Classifier, ClassifierError>` - The trained classifier, or an error if:
    ///   - The configuration is invalid
    ///   - No classes have been added
    ///   - There are no more examples than classes
    ///   - No subset of the features yields an invertible covariance matrix
    ///
    /// # Example
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use gesture_classifier::ClassifierBuilder;
    ///
    /// let classifier = ClassifierBuilder::new()
    ///     .with_examples("tap", vec![[0.0, 0.1], [0.1, 0.0], [-0.1, -0.05]])
    ///     .with_examples("swipe", vec![[5.0, 0.2], [5.5, -0.1], [4.8, 0.1]])
    ///     .train()?;
    /// assert_eq!(classifier.classify(&[5.1, 0.0])?.label, "swipe");
    /// # Ok(())
    /// # }
    /// ```
    pub fn train(&self) -> Result<Classifier, ClassifierError> {
        self.config.validate()?;
        let nfeatures = match self.nfeatures {
            Some(n) if !self.classes.is_empty() => n,
            _ => return Err(ClassifierError::NoClasses),
        };

        let examples: usize = self.classes.iter().map(ClassStatistics::example_count).sum();
        info!(
            "Training on {} examples across {} classes with {} features",
            examples,
            self.classes.len(),
            nfeatures
        );

        let pooled = trainer::pooled_covariance(&self.classes, nfeatures)?;
        let inverse_covariance = trainer::invert_covariance(&pooled, self.config.singularity_epsilon)?;

        let classes = self
            .classes
            .iter()
            .map(|stats| {
                let (weight, constant) = trainer::discriminant(&inverse_covariance, stats.mean());
                TrainedClass {
                    name: stats.name().to_string(),
                    index: stats.index(),
                    mean: stats.mean().clone(),
                    weight,
                    constant,
                    example_count: Some(stats.example_count()),
                }
            })
            .collect();

        info!("Training complete");
        Ok(Classifier {
            nfeatures,
            classes,
            inverse_covariance,
            config: self.config.clone(),
        })
    }
}
