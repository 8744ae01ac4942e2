//! A linear-discriminant classifier for gesture feature vectors.
//!
//! Labeled feature vectors are folded into per-class running statistics. Training
//! pools the within-class covariances into one shared estimate, inverts it, and
//! derives a linear discriminant function per class. Classifying a vector picks
//! the class whose discriminant is largest, which is the nearest class mean in
//! Mahalanobis distance.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use gesture_classifier::Classifier;
//!
//! let mut builder = Classifier::builder();
//! for x in [[0.0, 0.0], [0.3, -0.2], [-0.2, 0.3], [0.25, 0.15], [-0.1, -0.3]] {
//!     builder.add_example("dot", &x)?;
//! }
//! for x in [[10.0, 10.0], [10.3, 9.8], [9.8, 10.3], [10.25, 10.15], [9.9, 9.7]] {
//!     builder.add_example("stroke", &x)?;
//! }
//! let classifier = builder.train()?;
//!
//! let prediction = classifier.classify_with_metrics(&[0.1, -0.1])?;
//! println!("Predicted class: {}", prediction.label);
//! assert_eq!(prediction.label, "dot");
//! assert!(prediction.confidence.unwrap() > 0.9);
//! # Ok(())
//! # }
//! ```
//!
//! # Persistence
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # use gesture_classifier::Classifier;
//! # let classifier = Classifier::builder()
//! #     .with_examples("a", vec![[0.0, 0.0], [1.0, 0.5], [0.5, 1.0]])
//! #     .with_examples("b", vec![[9.0, 9.5], [10.0, 10.0], [9.5, 9.0]])
//! #     .train()?;
//! let mut record = Vec::new();
//! classifier.save(&mut record)?;
//! let restored = Classifier::load(record.as_slice())?;
//! assert_eq!(restored.classify(&[0.2, 0.4])?, classifier.classify(&[0.2, 0.4])?);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod linalg;

pub use classifier::{
    ClassPair, ClassStatistics, Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, Prediction,
    TrainedClass,
};
pub use config::TrainingConfig;

pub fn init_logger() {
    env_logger::init();
}
