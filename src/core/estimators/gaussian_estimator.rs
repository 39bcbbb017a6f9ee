use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

use crate::core::error::{ClassifierError, Result};
use crate::core::estimators::{VarianceEstimator, VarianceMode};

/// Running `(count, mean, M2)` aggregate of a multivariate sample.
///
/// `mean` and `m2` hold one entry per feature; `m2` is the sum of squared
/// deviations from the current mean. Aggregates built with
/// [`add_observation`](Self::add_observation), [`two_pass`](Self::two_pass)
/// or [`merge`](Self::merge) over the same multiset of points agree up to
/// floating point rounding, whatever the order or the split.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianEstimator {
    count: u64,
    mean: Array1<f64>,
    m2: Array1<f64>,
}

impl GaussianEstimator {
    pub fn new(dimensionality: usize) -> Self {
        Self {
            count: 0,
            mean: Array1::zeros(dimensionality),
            m2: Array1::zeros(dimensionality),
        }
    }

    pub fn from_parts(count: u64, mean: Array1<f64>, m2: Array1<f64>) -> Result<Self> {
        if mean.len() != m2.len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: mean.len(),
                found: m2.len(),
            });
        }
        Ok(Self { count, mean, m2 })
    }

    /// Aggregate of the `columns` of `data` (one point per column).
    ///
    /// Column indices must be in range.
    pub fn from_columns(
        data: ArrayView2<'_, f64>,
        columns: &[usize],
        mode: VarianceMode,
    ) -> Result<Self> {
        match mode {
            VarianceMode::TwoPass => Ok(Self::two_pass(data, columns)),
            VarianceMode::Online => Self::online(data, columns),
        }
    }

    pub fn two_pass(data: ArrayView2<'_, f64>, columns: &[usize]) -> Self {
        let mut est = Self::new(data.nrows());
        if columns.is_empty() {
            return est;
        }

        for &j in columns {
            est.mean += &data.column(j);
        }
        est.mean /= columns.len() as f64;

        for &j in columns {
            Zip::from(&mut est.m2)
                .and(&est.mean)
                .and(data.column(j))
                .for_each(|m2, &mean, &x| {
                    let dev = x - mean;
                    *m2 += dev * dev;
                });
        }
        est.count = columns.len() as u64;
        est
    }

    pub fn online(data: ArrayView2<'_, f64>, columns: &[usize]) -> Result<Self> {
        let mut est = Self::new(data.nrows());
        for &j in columns {
            est.add_observation(data.column(j))?;
        }
        Ok(est)
    }

    /// Welford update with a single point.
    pub fn add_observation(&mut self, point: ArrayView1<'_, f64>) -> Result<()> {
        self.check_dimensionality(point.len())?;
        let n = self
            .count
            .checked_add(1)
            .ok_or_else(|| ClassifierError::InvalidState("observation count overflow".into()))?;
        let n_f = n as f64;

        Zip::from(&mut self.mean)
            .and(&mut self.m2)
            .and(&point)
            .for_each(|mean, m2, &x| {
                let delta = x - *mean;
                *mean += delta / n_f;
                *m2 += delta * (x - *mean);
            });
        self.count = n;
        Ok(())
    }

    /// Folds `other` into `self` with the pairwise (Chan et al.) update.
    pub fn merge(&mut self, other: &GaussianEstimator) -> Result<()> {
        self.check_dimensionality(other.dimensionality())?;
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            *self = other.clone();
            return Ok(());
        }

        let n = self
            .count
            .checked_add(other.count)
            .ok_or_else(|| ClassifierError::InvalidState("merged count overflow".into()))?;
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n_f = n as f64;
        let cross = n_a * n_b / n_f;

        Zip::from(&mut self.mean)
            .and(&mut self.m2)
            .and(&other.mean)
            .and(&other.m2)
            .for_each(|mean_a, m2_a, &mean_b, &m2_b| {
                let delta = *mean_a - mean_b;
                *m2_a += m2_b + delta * delta * cross;
                *mean_a = (n_a * *mean_a + n_b * mean_b) / n_f;
            });
        self.count = n;
        Ok(())
    }

    /// Per-feature variance, never below `floor`.
    pub fn variance(&self, estimator: VarianceEstimator, floor: f64) -> Array1<f64> {
        match estimator.denominator(self.count) {
            Some(den) => self.m2.mapv(|m2| (m2 / den).max(floor)),
            None => Array1::from_elem(self.dimensionality(), floor),
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn dimensionality(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn m2(&self) -> ArrayView1<'_, f64> {
        self.m2.view()
    }

    #[inline]
    fn check_dimensionality(&self, found: usize) -> Result<()> {
        if found != self.dimensionality() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimensionality(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    const EPS: f64 = 1e-9;

    fn sample() -> Array2<f64> {
        array![
            [1.0, 4.0, -2.0, 7.5, 0.25, 3.0],
            [10.0, 10.5, 9.0, 11.0, 10.0, 9.5],
        ]
    }

    #[test]
    fn new_is_empty() {
        let est = GaussianEstimator::new(3);
        assert!(est.is_empty());
        assert_eq!(est.dimensionality(), 3);
        assert_eq!(est.mean(), Array1::<f64>::zeros(3));
    }

    #[test]
    fn two_pass_matches_hand_computation() {
        let data = array![[1.0, 2.0, 3.0], [2.0, 2.0, 2.0]];
        let est = GaussianEstimator::two_pass(data.view(), &[0, 1, 2]);
        assert_eq!(est.count(), 3);
        assert_abs_diff_eq!(est.mean(), array![2.0, 2.0].view(), epsilon = EPS);
        assert_abs_diff_eq!(est.m2(), array![2.0, 0.0].view(), epsilon = EPS);

        let unbiased = est.variance(VarianceEstimator::Unbiased, 1e-12);
        assert_abs_diff_eq!(unbiased, array![1.0, 1e-12], epsilon = EPS);
        let biased = est.variance(VarianceEstimator::Biased, 1e-12);
        assert_abs_diff_eq!(biased, array![2.0 / 3.0, 1e-12], epsilon = EPS);
    }

    #[test]
    fn online_agrees_with_two_pass() {
        let data = sample();
        let cols: Vec<usize> = (0..data.ncols()).collect();
        let a = GaussianEstimator::two_pass(data.view(), &cols);
        let b = GaussianEstimator::online(data.view(), &cols).unwrap();
        assert_eq!(a.count(), b.count());
        assert_abs_diff_eq!(a.mean(), b.mean(), epsilon = EPS);
        assert_abs_diff_eq!(a.m2(), b.m2(), epsilon = EPS);
    }

    #[test]
    fn online_is_order_independent() {
        let data = sample();
        let a = GaussianEstimator::online(data.view(), &[0, 1, 2, 3, 4, 5]).unwrap();
        let b = GaussianEstimator::online(data.view(), &[5, 3, 1, 4, 0, 2]).unwrap();
        assert_abs_diff_eq!(a.mean(), b.mean(), epsilon = EPS);
        assert_abs_diff_eq!(a.m2(), b.m2(), epsilon = EPS);
    }

    #[test]
    fn merge_equals_single_aggregate() {
        let data = sample();
        let whole = GaussianEstimator::two_pass(data.view(), &[0, 1, 2, 3, 4, 5]);

        let mut left = GaussianEstimator::two_pass(data.view(), &[0, 1]);
        let right = GaussianEstimator::two_pass(data.view(), &[2, 3, 4, 5]);
        left.merge(&right).unwrap();

        assert_eq!(left.count(), whole.count());
        assert_abs_diff_eq!(left.mean(), whole.mean(), epsilon = EPS);
        assert_abs_diff_eq!(left.m2(), whole.m2(), epsilon = EPS);
    }

    #[test]
    fn merge_with_empty_sides() {
        let data = sample();
        let block = GaussianEstimator::two_pass(data.view(), &[1, 3]);

        let mut empty = GaussianEstimator::new(2);
        empty.merge(&block).unwrap();
        assert_eq!(empty, block);

        let mut unchanged = block.clone();
        unchanged.merge(&GaussianEstimator::new(2)).unwrap();
        assert_eq!(unchanged, block);
    }

    #[test]
    fn single_point_has_floored_variance() {
        let mut est = GaussianEstimator::new(2);
        est.add_observation(array![3.0, -1.0].view()).unwrap();
        assert_eq!(est.m2(), array![0.0, 0.0]);

        let floor = 1e-9;
        for estimator in [VarianceEstimator::Biased, VarianceEstimator::Unbiased] {
            let var = est.variance(estimator, floor);
            assert!(var.iter().all(|&v| (v - floor).abs() < f64::EPSILON));
        }
    }

    #[test]
    fn empty_estimator_variance_is_floor() {
        let est = GaussianEstimator::new(4);
        let var = est.variance(VarianceEstimator::Biased, 0.5);
        assert_eq!(var, Array1::from_elem(4, 0.5));
    }

    #[test]
    fn rejects_wrong_dimensionality() {
        let mut est = GaussianEstimator::new(2);
        let err = est.add_observation(array![1.0, 2.0, 3.0].view()).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        ));

        let err = est.merge(&GaussianEstimator::new(3)).unwrap_err();
        assert!(matches!(err, ClassifierError::DimensionMismatch { .. }));
        assert!(GaussianEstimator::from_parts(1, Array1::zeros(2), Array1::zeros(3)).is_err());
    }

    #[test]
    fn count_overflow_is_invalid_state() {
        let mut full =
            GaussianEstimator::from_parts(u64::MAX, Array1::zeros(1), Array1::zeros(1)).unwrap();
        let err = full.add_observation(array![1.0].view()).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidState(_)));

        let mut one = GaussianEstimator::new(1);
        one.add_observation(array![1.0].view()).unwrap();
        let err = full.merge(&one).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidState(_)));
        assert_eq!(full.count(), u64::MAX);
    }
}
