//! Dense linear-algebra helpers used by the trainer and evaluator.
//!
//! Everything here works on `ndarray` types. Inversion is plain Gauss-Jordan
//! elimination with partial pivoting, which is plenty for the small
//! covariance matrices a gesture classifier deals with.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Result of a successful matrix inversion.
#[derive(Debug, Clone)]
pub struct Inverse {
    pub matrix: Array2<f64>,
    pub determinant: f64,
}

/// Inverts a square matrix, returning the inverse together with the
/// determinant of the input.
///
/// Returns `None` when the matrix is not square or when elimination hits an
/// exactly zero pivot (determinant zero). Near-singular matrices still come
/// back as `Some`; callers decide what determinant is too small to trust.
pub fn invert(matrix: ArrayView2<f64>) -> Option<Inverse> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return None;
    }

    let mut reduced = matrix.to_owned();
    let mut inverse = Array2::<f64>::eye(n);
    let mut determinant = 1.0;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| reduced[[a, col]].abs().total_cmp(&reduced[[b, col]].abs()))?;
        let pivot = reduced[[pivot_row, col]];
        if pivot == 0.0 {
            return None;
        }

        if pivot_row != col {
            swap_rows(&mut reduced, pivot_row, col);
            swap_rows(&mut inverse, pivot_row, col);
            determinant = -determinant;
        }
        determinant *= pivot;

        reduced.row_mut(col).mapv_inplace(|v| v / pivot);
        inverse.row_mut(col).mapv_inplace(|v| v / pivot);

        let pivot_reduced = reduced.row(col).to_owned();
        let pivot_inverse = inverse.row(col).to_owned();
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = reduced[[row, col]];
            if factor == 0.0 {
                continue;
            }
            reduced.row_mut(row).scaled_add(-factor, &pivot_reduced);
            inverse.row_mut(row).scaled_add(-factor, &pivot_inverse);
        }
    }

    Some(Inverse { matrix: inverse, determinant })
}

fn swap_rows(matrix: &mut Array2<f64>, a: usize, b: usize) {
    for j in 0..matrix.ncols() {
        matrix.swap([a, j], [b, j]);
    }
}

/// Extracts the rows and columns named by `indices` into a new square matrix.
pub fn slice_matrix(matrix: ArrayView2<f64>, indices: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), indices).select(Axis(1), indices)
}

/// Scatters `sub` back into an `n x n` matrix filled with `fill`, placing
/// `sub[[a, b]]` at `[[indices[a], indices[b]]]`.
pub fn deslice_matrix(sub: ArrayView2<f64>, fill: f64, indices: &[usize], n: usize) -> Array2<f64> {
    let mut full = Array2::from_elem((n, n), fill);
    for (a, &i) in indices.iter().enumerate() {
        for (b, &j) in indices.iter().enumerate() {
            full[[i, j]] = sub[[a, b]];
        }
    }
    full
}

/// Computes `v' M v`.
pub fn quadratic_form(v: ArrayView1<f64>, m: ArrayView2<f64>) -> f64 {
    v.dot(&m.dot(&v))
}

/// Squared Mahalanobis distance between `v` and `u` under the inverse
/// covariance `sigma_inv`. The difference buffer belongs to this call.
pub fn mahalanobis_distance(v: ArrayView1<f64>, u: ArrayView1<f64>, sigma_inv: ArrayView2<f64>) -> f64 {
    let diff = &v - &u;
    quadratic_form(diff.view(), sigma_inv)
}
