use std::io;

/// Represents the different types of errors that can occur while building,
/// training, querying or persisting a classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Invalid input parameters (class name, feature values, configuration)
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// A feature vector whose length disagrees with the classifier's
    #[error("Feature vector has {actual} features, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Training was requested before any example was added
    #[error("Training error: no classes have been added")]
    NoClasses,
    /// Fewer examples than needed to estimate a pooled covariance
    #[error("Training error: {examples} examples across {classes} classes leave no degrees of freedom")]
    InsufficientData { examples: usize, classes: usize },
    /// Every combination of features is collinear
    #[error("Training error: no subset of the {nfeatures} features yields an invertible covariance matrix")]
    Degenerate { nfeatures: usize },
    /// A persisted classifier record could not be parsed
    #[error("Persistence error at line {line}: {reason}")]
    Persistence { line: usize, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
