//! Turns accumulated per-class statistics into discriminant functions.
//!
//! Each stage produces a fresh matrix: the per-class accumulators are pooled
//! (upper triangle only), scaled by the degrees of freedom, mirrored into a
//! full symmetric covariance estimate, and finally inverted. When the pooled
//! covariance is singular, [`repair_degeneracy`] drops features until the
//! remaining ones give an invertible sub-matrix.

use log::{debug, warn};
use ndarray::{Array1, Array2};

use super::error::ClassifierError;
use super::stats::ClassStatistics;
use crate::linalg::{deslice_matrix, invert, slice_matrix};

/// Sums the upper triangles of every class's accumulator.
pub(crate) fn pool_accumulators(classes: &[ClassStatistics], nfeatures: usize) -> Array2<f64> {
    let mut pooled = Array2::zeros((nfeatures, nfeatures));
    for class in classes {
        let acc = class.covariance_accumulator();
        for i in 0..nfeatures {
            for j in i..nfeatures {
                pooled[[i, j]] += acc[[i, j]];
            }
        }
    }
    pooled
}

/// Number of examples minus number of classes, which must be positive.
pub(crate) fn degrees_of_freedom(classes: &[ClassStatistics]) -> Result<usize, ClassifierError> {
    let examples: usize = classes.iter().map(ClassStatistics::example_count).sum();
    if examples <= classes.len() {
        return Err(ClassifierError::InsufficientData { examples, classes: classes.len() });
    }
    Ok(examples - classes.len())
}

/// Mirrors the upper triangle of `upper` into a full symmetric matrix.
pub(crate) fn symmetrize(upper: &Array2<f64>) -> Array2<f64> {
    Array2::from_shape_fn(upper.raw_dim(), |(i, j)| if i <= j { upper[[i, j]] } else { upper[[j, i]] })
}

/// Pooled within-class covariance estimate shared by all classes.
pub(crate) fn pooled_covariance(
    classes: &[ClassStatistics],
    nfeatures: usize,
) -> Result<Array2<f64>, ClassifierError> {
    let dof = degrees_of_freedom(classes)?;
    let scaled = pool_accumulators(classes, nfeatures) / dof as f64;
    Ok(symmetrize(&scaled))
}

fn invertible_subset(pooled: &Array2<f64>, indices: &[usize], epsilon: f64) -> Option<Array2<f64>> {
    let sub = slice_matrix(pooled.view(), indices);
    invert(sub.view())
        .filter(|inv| inv.determinant.abs() > epsilon)
        .map(|inv| inv.matrix)
}

/// Inverts the pooled covariance, falling back to [`repair_degeneracy`] when
/// it is singular.
pub(crate) fn invert_covariance(pooled: &Array2<f64>, epsilon: f64) -> Result<Array2<f64>, ClassifierError> {
    match invert(pooled.view()) {
        Some(inv) if inv.determinant.abs() > epsilon => {
            debug!("Pooled covariance inverted directly, det={}", inv.determinant);
            Ok(inv.matrix)
        }
        other => {
            let det = other.map_or(0.0, |inv| inv.determinant);
            warn!("Pooled covariance is singular (det={}), dropping features", det);
            repair_degeneracy(pooled, epsilon)
        }
    }
}

/// Greedily keeps features in ascending order, rejecting any whose addition
/// makes the covariance sub-matrix singular, then scatters the inverse of the
/// kept sub-matrix into a zero-filled full-size matrix.
pub(crate) fn repair_degeneracy(pooled: &Array2<f64>, epsilon: f64) -> Result<Array2<f64>, ClassifierError> {
    let nfeatures = pooled.nrows();
    let mut kept: Vec<usize> = Vec::with_capacity(nfeatures);

    for feature in 0..nfeatures {
        kept.push(feature);
        if invertible_subset(pooled, &kept, epsilon).is_none() {
            debug!("Feature {} makes the covariance singular, ignoring it", feature);
            kept.pop();
        }
    }

    if kept.is_empty() {
        return Err(ClassifierError::Degenerate { nfeatures });
    }
    let sub_inverse = invertible_subset(pooled, &kept, epsilon)
        .ok_or(ClassifierError::Degenerate { nfeatures })?;

    let dropped: Vec<usize> = (0..nfeatures).filter(|i| !kept.contains(i)).collect();
    warn!("Ignoring features {:?}; training on {} of {}", dropped, kept.len(), nfeatures);

    Ok(deslice_matrix(sub_inverse.view(), 0.0, &kept, nfeatures))
}

/// Weight vector and constant term of one class's linear discriminant.
pub(crate) fn discriminant(inverse_covariance: &Array2<f64>, mean: &Array1<f64>) -> (Array1<f64>, f64) {
    let weight = inverse_covariance.dot(mean);
    let constant = -0.5 * weight.dot(mean);
    (weight, constant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn class_from(name: &str, index: usize, examples: &[&[f64]]) -> ClassStatistics {
        let mut stats = ClassStatistics::new(name, index, examples[0].len());
        for x in examples {
            stats.fold(x);
        }
        stats
    }

    #[test]
    fn test_degrees_of_freedom() {
        let one_each = vec![class_from("a", 0, &[&[1.0]]), class_from("b", 1, &[&[2.0]])];
        assert!(matches!(
            degrees_of_freedom(&one_each),
            Err(ClassifierError::InsufficientData { examples: 2, classes: 2 })
        ));

        let enough = vec![class_from("a", 0, &[&[1.0], &[2.0]]), class_from("b", 1, &[&[2.0]])];
        assert_eq!(degrees_of_freedom(&enough).unwrap(), 1);
    }

    #[test]
    fn test_pooled_covariance_is_symmetric_and_scaled_once() {
        let classes = vec![
            class_from("a", 0, &[&[0.0, 0.0], &[2.0, 4.0]]),
            class_from("b", 1, &[&[10.0, 10.0], &[10.0, 12.0]]),
        ];
        let pooled = pooled_covariance(&classes, 2).unwrap();
        // accumulators: a = [[2, 4], [., 8]], b = [[0, 0], [., 2]]; dof = 2
        assert_eq!(pooled, array![[1.0, 2.0], [2.0, 5.0]]);
    }

    #[test]
    fn test_invertible_covariance_keeps_every_feature() {
        let pooled = array![[2.0, 0.5], [0.5, 1.0]];
        let inverse = invert_covariance(&pooled, 1e-6).unwrap();
        let product = pooled.dot(&inverse);
        assert!((product[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((product[[1, 1]] - 1.0).abs() < 1e-12);
        assert!(inverse.iter().all(|&v| v != 0.0));
    }

    #[test]
    fn test_repair_zeroes_dropped_feature() {
        // feature 1 has no variance at all
        let pooled = array![[2.0, 0.0, 0.5], [0.0, 0.0, 0.0], [0.5, 0.0, 1.0]];
        let inverse = invert_covariance(&pooled, 1e-6).unwrap();
        for k in 0..3 {
            assert_eq!(inverse[[1, k]], 0.0);
            assert_eq!(inverse[[k, 1]], 0.0);
        }
        let expected = invert(array![[2.0, 0.5], [0.5, 1.0]].view()).unwrap().matrix;
        assert_eq!(inverse[[0, 0]], expected[[0, 0]]);
        assert_eq!(inverse[[0, 2]], expected[[0, 1]]);
        assert_eq!(inverse[[2, 2]], expected[[1, 1]]);
    }

    #[test]
    fn test_repair_fails_when_nothing_is_invertible() {
        let pooled = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            repair_degeneracy(&pooled, 1e-6),
            Err(ClassifierError::Degenerate { nfeatures: 3 })
        ));
    }

    #[test]
    fn test_discriminant() {
        let inverse = array![[2.0, 0.0], [0.0, 0.5]];
        let mean = array![1.0, 2.0];
        let (weight, constant) = discriminant(&inverse, &mean);
        assert_eq!(weight, array![2.0, 1.0]);
        assert_eq!(constant, -2.0);
    }
}
