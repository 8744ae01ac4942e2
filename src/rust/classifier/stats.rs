use ndarray::{Array1, Array2};

/// Running statistics for one class while examples are being added.
///
/// The mean and the upper triangle of the sum-of-deviations matrix are
/// updated in place for every example, so the examples themselves are never
/// stored.
#[derive(Debug, Clone)]
pub struct ClassStatistics {
    name: String,
    index: usize,
    example_count: usize,
    mean: Array1<f64>,
    covariance_accumulator: Array2<f64>,
}

impl ClassStatistics {
    pub(crate) fn new(name: impl Into<String>, index: usize, nfeatures: usize) -> Self {
        Self {
            name: name.into(),
            index,
            example_count: 0,
            mean: Array1::zeros(nfeatures),
            covariance_accumulator: Array2::zeros((nfeatures, nfeatures)),
        }
    }

    /// Folds one feature vector into the running mean and covariance.
    ///
    /// The deviation is taken against the mean *before* it is updated; the
    /// incremental formula depends on that order. The caller checks the
    /// vector length.
    pub(crate) fn fold(&mut self, features: &[f64]) {
        self.example_count += 1;
        let n = self.example_count as f64;
        let nm1_over_n = (n - 1.0) / n;
        let recip_n = 1.0 / n;

        let delta: Array1<f64> = features
            .iter()
            .zip(self.mean.iter())
            .map(|(x, m)| x - m)
            .collect();

        let nfeatures = delta.len();
        for i in 0..nfeatures {
            for j in i..nfeatures {
                self.covariance_accumulator[[i, j]] += nm1_over_n * delta[i] * delta[j];
            }
        }

        for (m, &x) in self.mean.iter_mut().zip(features) {
            *m = nm1_over_n * *m + recip_n * x;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn example_count(&self) -> usize {
        self.example_count
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Sum of outer products of deviations from the mean. Only entries with
    /// `row <= col` are meaningful; the lower triangle stays zero.
    pub fn covariance_accumulator(&self) -> &Array2<f64> {
        &self.covariance_accumulator
    }

    /// Sample covariance of this class alone, or `None` with fewer than two
    /// examples.
    pub fn sample_covariance(&self) -> Option<Array2<f64>> {
        if self.example_count < 2 {
            return None;
        }
        let scale = 1.0 / (self.example_count - 1) as f64;
        let upper = &self.covariance_accumulator;
        Some(Array2::from_shape_fn(upper.raw_dim(), |(i, j)| {
            if i <= j { upper[[i, j]] * scale } else { upper[[j, i]] * scale }
        }))
    }
}
