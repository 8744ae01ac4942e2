use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;

use crate::classifier::ClassifierError;

/// Environment variable that overrides the default singularity threshold.
pub const EPSILON_ENV: &str = "GESTURE_CLASSIFIER_EPSILON";

/// Numeric settings shared by training and classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// A covariance matrix whose determinant is at most this (in absolute
    /// value) is treated as singular.
    pub singularity_epsilon: f64,
    /// Maximum number of distinct classes a classifier may hold.
    pub max_classes: usize,
    /// Discriminant gaps at or below this are left out of the confidence sum.
    pub ambiguity_cutoff: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            singularity_epsilon: 1.0e-6,
            max_classes: 100,
            ambiguity_cutoff: -7.0,
        }
    }
}

impl TrainingConfig {
    /// Default configuration, with the singularity threshold taken from
    /// `GESTURE_CLASSIFIER_EPSILON` when it is set to a usable number.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(EPSILON_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(epsilon) if epsilon.is_finite() && epsilon >= 0.0 => {
                    info!("Using singularity epsilon {} from {}", epsilon, EPSILON_ENV);
                    config.singularity_epsilon = epsilon;
                }
                _ => warn!("Ignoring invalid {} value {:?}", EPSILON_ENV, raw),
            }
        }
        config
    }

    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        if !self.singularity_epsilon.is_finite() || self.singularity_epsilon < 0.0 {
            return Err(ClassifierError::ValidationError(format!(
                "Singularity epsilon must be a finite non-negative number, got {}",
                self.singularity_epsilon
            )));
        }
        if self.max_classes == 0 {
            return Err(ClassifierError::ValidationError("Maximum number of classes must be at least 1".into()));
        }
        if self.ambiguity_cutoff.is_nan() || self.ambiguity_cutoff > 0.0 {
            return Err(ClassifierError::ValidationError(format!(
                "Ambiguity cutoff must not be positive, got {}",
                self.ambiguity_cutoff
            )));
        }
        Ok(())
    }
}
