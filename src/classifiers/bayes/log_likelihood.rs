use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

/// Unnormalized log posterior of each class under independent Gaussians.
///
/// For class `c` and point `x`:
///
/// ```text
/// ll_c = ln(prior_c) + Σ_i [ -0.5 ln(2π var_ci) - (x_i - mean_ci)² / (2 var_ci) ]
/// ```
///
/// The terms that do not depend on `x` are folded into one constant per
/// class at construction. A zero prior gives a constant of `-inf`, which
/// makes the class unselectable. Variances are assumed to be floored by
/// the trainer, so neither the division nor the logarithm can blow up.
#[derive(Debug, Clone)]
pub struct GaussianLogLikelihood<'a> {
    means: ArrayView2<'a, f64>,
    half_precisions: Array2<f64>,
    class_constants: Array1<f64>,
}

impl<'a> GaussianLogLikelihood<'a> {
    /// `means` and `variances` are `D × C`; `priors` has length `C`.
    pub fn new(
        means: ArrayView2<'a, f64>,
        variances: ArrayView2<'_, f64>,
        priors: ArrayView1<'_, f64>,
    ) -> Self {
        debug_assert_eq!(means.dim(), variances.dim());
        debug_assert_eq!(means.ncols(), priors.len());

        let half_precisions = variances.mapv(|v| 0.5 / v);
        let class_constants = Zip::from(variances.columns())
            .and(&priors)
            .map_collect(|var, &prior| {
                let log_det = var.fold(0.0, |acc, &v| acc + (2.0 * PI * v).ln());
                prior.ln() - 0.5 * log_det
            });

        Self {
            means,
            half_precisions,
            class_constants,
        }
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.class_constants.len()
    }

    #[inline]
    pub fn dimensionality(&self) -> usize {
        self.means.nrows()
    }

    /// Writes the `C` log-likelihoods of `point` into `out`.
    pub fn evaluate_into(&self, point: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
        Zip::from(&mut out)
            .and(&self.class_constants)
            .and(self.means.columns())
            .and(self.half_precisions.columns())
            .for_each(|ll, &constant, mean, half_precision| {
                let quad = Zip::from(&point)
                    .and(&mean)
                    .and(&half_precision)
                    .fold(0.0, |acc, &x, &m, &h| {
                        let d = x - m;
                        acc + d * d * h
                    });
                *ll = constant - quad;
            });
    }

    pub fn evaluate(&self, point: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.num_classes());
        self.evaluate_into(point, out.view_mut());
        out
    }

    /// `C × N` log-likelihoods for the `D × N` batch `data`, one column per point.
    ///
    /// Columns are independent, so `parallel` only changes scheduling.
    pub fn evaluate_batch(&self, data: ArrayView2<'_, f64>, parallel: bool) -> Array2<f64> {
        let mut out = Array2::zeros((self.num_classes(), data.ncols()));
        let zip = Zip::from(out.columns_mut()).and(data.columns());
        if parallel {
            zip.par_for_each(|ll, x| self.evaluate_into(x, ll));
        } else {
            zip.for_each(|ll, x| self.evaluate_into(x, ll));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    const EPS: f64 = 1e-12;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn normal_log_pdf(x: f64, mean: f64, var: f64) -> f64 {
        -0.5 * (2.0 * PI * var).ln() - (x - mean).powi(2) / (2.0 * var)
    }

    #[test]
    fn matches_sum_of_univariate_log_densities() {
        let means = array![[0.0, 5.0], [1.0, -2.0]];
        let vars = array![[1.0, 2.0], [0.5, 4.0]];
        let priors = array![0.25, 0.75];
        let ll = GaussianLogLikelihood::new(means.view(), vars.view(), priors.view());

        let x = array![0.5, 0.0];
        let got = ll.evaluate(x.view());

        let want0 = 0.25f64.ln() + normal_log_pdf(0.5, 0.0, 1.0) + normal_log_pdf(0.0, 1.0, 0.5);
        let want1 = 0.75f64.ln() + normal_log_pdf(0.5, 5.0, 2.0) + normal_log_pdf(0.0, -2.0, 4.0);
        assert!(approx_eq(got[0], want0, EPS));
        assert!(approx_eq(got[1], want1, EPS));
    }

    #[test]
    fn zero_prior_is_negative_infinity() {
        let means = array![[0.0, 0.0]];
        let vars = array![[1.0, 1.0]];
        let priors = array![1.0, 0.0];
        let ll = GaussianLogLikelihood::new(means.view(), vars.view(), priors.view());

        let got = ll.evaluate(array![0.0].view());
        assert!(got[0].is_finite());
        assert_eq!(got[1], f64::NEG_INFINITY);
    }

    #[test]
    fn tiny_variance_stays_finite() {
        let means = array![[3.0]];
        let vars = array![[1e-9]];
        let priors = array![1.0];
        let ll = GaussianLogLikelihood::new(means.view(), vars.view(), priors.view());

        for x in [3.0, 3.5, -100.0, 1e6] {
            assert!(ll.evaluate(array![x].view())[0].is_finite());
        }
    }

    #[test]
    fn many_features_do_not_underflow() {
        let d = 2000;
        let means = Array2::zeros((d, 1));
        let vars = Array2::from_elem((d, 1), 1.0);
        let priors = array![1.0];
        let ll = GaussianLogLikelihood::new(means.view(), vars.view(), priors.view());

        let x = Array1::from_elem(d, 3.0);
        let got = ll.evaluate(x.view())[0];
        let want = d as f64 * normal_log_pdf(3.0, 0.0, 1.0);
        assert!(got.is_finite());
        assert!(approx_eq(got, want, 1e-6));
    }

    #[test]
    fn batch_columns_match_single_points_in_both_schedules() {
        let means = array![[0.0, 10.0], [0.0, 10.0]];
        let vars = array![[1.0, 1.0], [1.0, 2.0]];
        let priors = array![0.5, 0.5];
        let ll = GaussianLogLikelihood::new(means.view(), vars.view(), priors.view());

        let data = array![[0.0, 10.0, 4.0], [1.0, 9.0, 6.0]];
        let sequential = ll.evaluate_batch(data.view(), false);
        let parallel = ll.evaluate_batch(data.view(), true);
        assert_eq!(sequential.dim(), (2, 3));
        assert_eq!(sequential, parallel);

        for (j, column) in data.columns().into_iter().enumerate() {
            assert_abs_diff_eq!(sequential.column(j), ll.evaluate(column).view(), epsilon = EPS);
        }
    }
}
