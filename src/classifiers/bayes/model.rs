use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::classifiers::bayes::NaiveBayesConfig;
use crate::core::error::{ClassifierError, Result};
use crate::core::estimators::GaussianEstimator;

/// Largest allowed deviation of `Σ priors` from one, and of each prior from
/// `count / total`, when loading parameters.
pub const PRIOR_TOLERANCE: f64 = 1e-9;

/// Flat parameter set of a trained model.
///
/// `means` and `variances` are `D × C` (one column per class). The on-disk
/// layout is left to whoever serializes this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub means: Array2<f64>,
    pub variances: Array2<f64>,
    pub priors: Array1<f64>,
    pub training_point_count: u64,
    pub per_class_count: Vec<u64>,
}

/// Per-class Gaussian aggregates plus the `D × C` views the evaluator reads.
///
/// The estimators are the source of truth; `means` and `variances` are
/// refreshed from them whenever a class changes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModelState {
    estimators: Vec<GaussianEstimator>,
    means: Array2<f64>,
    variances: Array2<f64>,
    training_point_count: u64,
}

impl ModelState {
    pub(crate) fn zeroed(dimensionality: usize, classes: usize, floor: f64) -> Self {
        Self {
            estimators: vec![GaussianEstimator::new(dimensionality); classes],
            means: Array2::zeros((dimensionality, classes)),
            variances: Array2::from_elem((dimensionality, classes), floor),
            training_point_count: 0,
        }
    }

    /// Builds a state from finished per-class aggregates.
    pub(crate) fn from_estimators(
        dimensionality: usize,
        estimators: Vec<GaussianEstimator>,
        config: &NaiveBayesConfig,
    ) -> Result<Self> {
        let mut total: u64 = 0;
        for est in &estimators {
            total = total.checked_add(est.count()).ok_or_else(|| {
                ClassifierError::InvalidState("training point count overflow".into())
            })?;
        }
        let mut state = Self::zeroed(dimensionality, estimators.len(), config.variance_floor);
        state.estimators = estimators;
        state.training_point_count = total;
        for c in 0..state.estimators.len() {
            state.refresh_class(c, config);
        }
        Ok(state)
    }

    #[inline]
    pub(crate) fn dimensionality(&self) -> usize {
        self.means.nrows()
    }

    #[inline]
    pub(crate) fn num_classes(&self) -> usize {
        self.estimators.len()
    }

    #[inline]
    pub(crate) fn training_point_count(&self) -> u64 {
        self.training_point_count
    }

    #[inline]
    pub(crate) fn is_trained(&self) -> bool {
        self.training_point_count > 0
    }

    pub(crate) fn estimators(&self) -> &[GaussianEstimator] {
        &self.estimators
    }

    pub(crate) fn means(&self) -> ArrayView2<'_, f64> {
        self.means.view()
    }

    pub(crate) fn variances(&self) -> ArrayView2<'_, f64> {
        self.variances.view()
    }

    pub(crate) fn per_class_count(&self) -> Vec<u64> {
        self.estimators.iter().map(GaussianEstimator::count).collect()
    }

    /// `count[c] / total`, or all zeros before any training.
    pub(crate) fn priors(&self) -> Array1<f64> {
        if self.training_point_count == 0 {
            return Array1::zeros(self.num_classes());
        }
        let total = self.training_point_count as f64;
        self.estimators
            .iter()
            .map(|est| est.count() as f64 / total)
            .collect()
    }

    /// Single-point Welford update of class `label`.
    pub(crate) fn observe(
        &mut self,
        point: ArrayView1<'_, f64>,
        label: usize,
        config: &NaiveBayesConfig,
    ) -> Result<()> {
        let total = self
            .training_point_count
            .checked_add(1)
            .ok_or_else(|| ClassifierError::InvalidState("training point count overflow".into()))?;
        self.estimators[label].add_observation(point)?;
        self.training_point_count = total;
        self.refresh_class(label, config);
        Ok(())
    }

    /// Replaces the aggregates of the given classes and the total count.
    ///
    /// Callers compute the new values up front, so this cannot fail halfway.
    pub(crate) fn commit(
        &mut self,
        updates: Vec<(usize, GaussianEstimator)>,
        training_point_count: u64,
        config: &NaiveBayesConfig,
    ) {
        for (c, est) in updates {
            self.estimators[c] = est;
            self.refresh_class(c, config);
        }
        self.training_point_count = training_point_count;
    }

    pub(crate) fn refresh_class(&mut self, c: usize, config: &NaiveBayesConfig) {
        let est = &self.estimators[c];
        self.means.column_mut(c).assign(&est.mean());
        self.variances
            .column_mut(c)
            .assign(&est.variance(config.variance_estimator, config.variance_floor));
    }

    pub(crate) fn to_parameters(&self) -> ModelParameters {
        ModelParameters {
            means: self.means.clone(),
            variances: self.variances.clone(),
            priors: self.priors(),
            training_point_count: self.training_point_count,
            per_class_count: self.per_class_count(),
        }
    }

    /// Rebuilds a state from a parameter set after checking it.
    ///
    /// `M2` is reconstructed as `variance × denominator`, so a variance that
    /// was floored comes back as `floor × denominator` rather than zero.
    pub(crate) fn from_parameters(
        params: ModelParameters,
        config: &NaiveBayesConfig,
    ) -> Result<Self> {
        validate_parameters(&params, config)?;

        let ModelParameters {
            means,
            variances,
            per_class_count,
            training_point_count,
            ..
        } = params;

        let estimators = per_class_count
            .iter()
            .enumerate()
            .map(|(c, &count)| {
                let m2 = match config.variance_estimator.denominator(count) {
                    Some(den) => variances.column(c).mapv(|v| v * den),
                    None => Array1::zeros(means.nrows()),
                };
                GaussianEstimator::from_parts(count, means.column(c).to_owned(), m2)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            estimators,
            means,
            variances,
            training_point_count,
        })
    }
}

fn invalid(msg: String) -> ClassifierError {
    ClassifierError::InvalidParameters(msg)
}

fn validate_parameters(params: &ModelParameters, config: &NaiveBayesConfig) -> Result<()> {
    let (d, c) = params.means.dim();
    if params.variances.dim() != (d, c) {
        return Err(invalid(format!(
            "variances shape {:?} does not match means shape {:?}",
            params.variances.dim(),
            (d, c)
        )));
    }
    if params.priors.len() != c {
        return Err(invalid(format!(
            "{} priors for {} classes",
            params.priors.len(),
            c
        )));
    }
    if params.per_class_count.len() != c {
        return Err(invalid(format!(
            "{} class counts for {} classes",
            params.per_class_count.len(),
            c
        )));
    }
    if params.means.iter().any(|m| !m.is_finite()) {
        return Err(invalid("means must be finite".into()));
    }
    if params
        .variances
        .iter()
        .any(|&v| !v.is_finite() || v < config.variance_floor)
    {
        return Err(invalid(format!(
            "variances must be finite and at least {}",
            config.variance_floor
        )));
    }

    let mut total: u64 = 0;
    for &n in &params.per_class_count {
        total = total
            .checked_add(n)
            .ok_or_else(|| invalid("class counts overflow".into()))?;
    }
    if total != params.training_point_count {
        return Err(invalid(format!(
            "class counts sum to {} but training point count is {}",
            total, params.training_point_count
        )));
    }

    if params.priors.iter().any(|&p| !(0.0..=1.0).contains(&p)) {
        return Err(invalid("priors must lie in [0, 1]".into()));
    }
    if total == 0 {
        if params.priors.iter().any(|&p| p != 0.0) {
            return Err(invalid("an untrained model must have zero priors".into()));
        }
        return Ok(());
    }
    if (params.priors.sum() - 1.0).abs() > PRIOR_TOLERANCE {
        return Err(invalid(format!(
            "priors sum to {} instead of 1",
            params.priors.sum()
        )));
    }
    for (class, (&p, &n)) in params
        .priors
        .iter()
        .zip(&params.per_class_count)
        .enumerate()
    {
        if (p - n as f64 / total as f64).abs() > PRIOR_TOLERANCE {
            return Err(invalid(format!(
                "prior {p} of class {class} disagrees with its count {n} of {total}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn config() -> NaiveBayesConfig {
        NaiveBayesConfig::default()
    }

    fn trained() -> ModelState {
        let data = array![[1.0, 3.0, 10.0, 12.0, 11.0], [0.0, 2.0, 5.0, 5.0, 8.0]];
        let estimators = vec![
            GaussianEstimator::two_pass(data.view(), &[0, 1]),
            GaussianEstimator::two_pass(data.view(), &[2, 3, 4]),
            GaussianEstimator::new(2),
        ];
        ModelState::from_estimators(2, estimators, &config()).unwrap()
    }

    #[test]
    fn zeroed_state_has_floored_variances() {
        let s = ModelState::zeroed(3, 2, 1e-9);
        assert_eq!(s.dimensionality(), 3);
        assert_eq!(s.num_classes(), 2);
        assert!(!s.is_trained());
        assert_eq!(s.means(), Array2::<f64>::zeros((3, 2)));
        assert!(s.variances().iter().all(|&v| v == 1e-9));
        assert_eq!(s.priors(), Array1::<f64>::zeros(2));
    }

    #[test]
    fn priors_come_from_counts() {
        let s = trained();
        assert_eq!(s.training_point_count(), 5);
        assert_eq!(s.per_class_count(), vec![2, 3, 0]);
        assert_abs_diff_eq!(s.priors(), array![0.4, 0.6, 0.0], epsilon = 1e-12);
        assert_eq!(s.priors()[2], 0.0);
    }

    #[test]
    fn empty_class_keeps_zero_mean_and_floor() {
        let s = trained();
        assert_eq!(s.means().column(2), array![0.0, 0.0]);
        assert!(s.variances().column(2).iter().all(|&v| v == 1e-9));
    }

    #[test]
    fn parameters_round_trip_through_load() {
        let s = trained();
        let reloaded = ModelState::from_parameters(s.to_parameters(), &config()).unwrap();
        assert_eq!(reloaded.per_class_count(), s.per_class_count());
        assert_abs_diff_eq!(reloaded.means(), s.means(), epsilon = 1e-12);
        assert_abs_diff_eq!(reloaded.variances(), s.variances(), epsilon = 1e-12);
        for (a, b) in reloaded.estimators().iter().zip(s.estimators()) {
            assert_abs_diff_eq!(a.m2(), b.m2(), epsilon = 1e-9);
        }
    }

    #[test]
    fn load_rejects_shape_mismatch() {
        let mut p = trained().to_parameters();
        p.variances = Array2::from_elem((3, 3), 1.0);
        assert!(matches!(
            ModelState::from_parameters(p, &config()),
            Err(ClassifierError::InvalidParameters(_))
        ));

        let mut p = trained().to_parameters();
        p.priors = array![0.4, 0.6];
        assert!(ModelState::from_parameters(p, &config()).is_err());

        let mut p = trained().to_parameters();
        p.per_class_count.push(0);
        assert!(ModelState::from_parameters(p, &config()).is_err());
    }

    #[test]
    fn load_rejects_sub_floor_variance() {
        let mut p = trained().to_parameters();
        p.variances[[0, 1]] = 0.0;
        assert!(ModelState::from_parameters(p, &config()).is_err());

        let mut p = trained().to_parameters();
        p.variances[[1, 0]] = f64::INFINITY;
        assert!(ModelState::from_parameters(p, &config()).is_err());
    }

    #[test]
    fn load_rejects_inconsistent_priors_and_counts() {
        let mut p = trained().to_parameters();
        p.priors = array![0.5, 0.6, 0.0];
        assert!(ModelState::from_parameters(p, &config()).is_err());

        let mut p = trained().to_parameters();
        p.priors = array![0.6, 0.4, 0.0];
        assert!(ModelState::from_parameters(p, &config()).is_err());

        let mut p = trained().to_parameters();
        p.training_point_count = 6;
        assert!(ModelState::from_parameters(p, &config()).is_err());
    }

    #[test]
    fn load_accepts_untrained_parameters() {
        let p = ModelState::zeroed(2, 2, 1e-9).to_parameters();
        let s = ModelState::from_parameters(p, &config()).unwrap();
        assert!(!s.is_trained());

        let mut p = ModelState::zeroed(2, 2, 1e-9).to_parameters();
        p.priors = array![0.5, 0.5];
        assert!(ModelState::from_parameters(p, &config()).is_err());
    }
}
