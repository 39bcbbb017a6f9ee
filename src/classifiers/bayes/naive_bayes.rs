use log::{debug, trace, warn};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix1, Ix2, Zip};
use rayon::prelude::*;

use crate::classifiers::Classifier;
use crate::classifiers::bayes::log_likelihood::GaussianLogLikelihood;
use crate::classifiers::bayes::model::{ModelParameters, ModelState};
use crate::classifiers::bayes::NaiveBayesConfig;
use crate::core::error::{ClassifierError, Result};
use crate::core::estimators::GaussianEstimator;
use crate::utils::math::{argmax, normalize_log_probabilities};

/// Gaussian Naive Bayes classifier.
///
/// Each class `c` is modeled by a prior and an independent Gaussian per
/// feature. Points are columns: a batch of `N` points in `D` dimensions is a
/// `D × N` matrix, and `means()` / `variances()` are `D × C`.
///
/// Training comes in three flavours that agree up to rounding on the same
/// multiset of points:
/// - [`train`](Self::train) with `incremental = false` replaces the model;
/// - [`train`](Self::train) with `incremental = true` merges a block into
///   the current aggregates;
/// - [`train_point`](Self::train_point) applies a single Welford update.
///
/// A model created with [`from_zero`](Self::from_zero) can be classified
/// against, but until it has seen data the answer is always label `0` with
/// uniform probabilities.
///
/// Training takes `&mut self` and classification `&self`, so sharing a model
/// between threads needs external synchronization such as an `RwLock`.
#[derive(Debug, Clone)]
pub struct NaiveBayesClassifier {
    config: NaiveBayesConfig,
    model: ModelState,
}

impl Default for NaiveBayesClassifier {
    fn default() -> Self {
        Self::from_zero(0, 0)
    }
}

impl NaiveBayesClassifier {
    /// Untrained model with all parameters zero and variances at the floor.
    ///
    /// A `dimensionality` of zero is adopted from the first training batch;
    /// so is a `classes` count of zero.
    pub fn from_zero(dimensionality: usize, classes: usize) -> Self {
        let config = NaiveBayesConfig::default();
        Self {
            model: ModelState::zeroed(dimensionality, classes, config.variance_floor),
            config,
        }
    }

    pub fn with_config(
        dimensionality: usize,
        classes: usize,
        config: NaiveBayesConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model: ModelState::zeroed(dimensionality, classes, config.variance_floor),
            config,
        })
    }

    /// Trains a new model on `data` (`D × N`) right away.
    ///
    /// `classes = None` infers the class count as `max(labels) + 1`.
    pub fn from_data<S>(
        data: &ArrayBase<S, Ix2>,
        labels: &[usize],
        classes: Option<usize>,
        config: NaiveBayesConfig,
    ) -> Result<Self>
    where
        S: Data<Elem = f64>,
    {
        let classes = classes.unwrap_or_else(|| infer_classes(labels));
        let mut nb = Self::with_config(data.nrows(), classes, config)?;
        nb.train(data, labels, false)?;
        Ok(nb)
    }

    /// Trains on a `D × N` block of points.
    ///
    /// With `incremental = false` the current model is discarded and the
    /// result depends on this block only. With `incremental = true` the
    /// block's per-class aggregates are merged into the existing ones.
    /// Nothing is modified when an error is returned.
    pub fn train<S>(
        &mut self,
        data: &ArrayBase<S, Ix2>,
        labels: &[usize],
        incremental: bool,
    ) -> Result<()>
    where
        S: Data<Elem = f64>,
    {
        let data = data.view();
        if labels.len() != data.ncols() {
            return Err(ClassifierError::LengthMismatch {
                points: data.ncols(),
                labels: labels.len(),
            });
        }
        let (d, c) = self.target_shape(data.nrows(), infer_classes(labels));
        check_dimensionality(d, data.nrows())?;
        if let Some(&label) = labels.iter().find(|&&l| l >= c) {
            return Err(ClassifierError::LabelOutOfRange { label, classes: c });
        }

        debug!(
            "training on {} points ({} features, {} classes, incremental={}, mode={})",
            data.ncols(),
            d,
            c,
            incremental,
            self.config.variance_mode
        );

        let blocks = self.block_aggregates(data, labels, c)?;

        if !(incremental && self.model.is_trained()) {
            self.model = ModelState::from_estimators(d, blocks, &self.config)?;
            return Ok(());
        }

        let block_total = u64::try_from(data.ncols())
            .map_err(|_| ClassifierError::InvalidState("block too large".into()))?;
        let total = self
            .model
            .training_point_count()
            .checked_add(block_total)
            .ok_or_else(|| ClassifierError::InvalidState("training point count overflow".into()))?;

        let mut updates = Vec::new();
        for (class, block) in blocks.into_iter().enumerate() {
            if block.is_empty() {
                continue;
            }
            let mut merged = self.model.estimators()[class].clone();
            merged.merge(&block)?;
            updates.push((class, merged));
        }
        self.model.commit(updates, total, &self.config);
        Ok(())
    }

    /// Single-point Welford update; always incremental.
    pub fn train_point<S>(&mut self, point: &ArrayBase<S, Ix1>, label: usize) -> Result<()>
    where
        S: Data<Elem = f64>,
    {
        let (d, c) = self.target_shape(point.len(), 0);
        check_dimensionality(d, point.len())?;
        if label >= c {
            return Err(ClassifierError::LabelOutOfRange { label, classes: c });
        }
        if (d, c) != (self.dimensionality(), self.num_classes()) {
            self.model = ModelState::zeroed(d, c, self.config.variance_floor);
        }
        trace!("training on a single point of class {label}");
        self.model.observe(point.view(), label, &self.config)
    }

    /// Most likely class of `point`; ties go to the lowest class index.
    pub fn classify<S>(&self, point: &ArrayBase<S, Ix1>) -> Result<usize>
    where
        S: Data<Elem = f64>,
    {
        self.classify_with_probabilities(point).map(|(label, _)| label)
    }

    /// Most likely class of `point` and the posterior of every class.
    pub fn classify_with_probabilities<S>(
        &self,
        point: &ArrayBase<S, Ix1>,
    ) -> Result<(usize, Array1<f64>)>
    where
        S: Data<Elem = f64>,
    {
        let ll = self.log_likelihood(point)?;
        let mut probabilities = Array1::zeros(ll.len());
        normalize_log_probabilities(ll.view(), probabilities.view_mut());
        let label = argmax(probabilities.view()).ok_or_else(no_classes)?;
        Ok((label, probabilities))
    }

    /// One label per column of `data`.
    pub fn classify_batch<S>(&self, data: &ArrayBase<S, Ix2>) -> Result<Array1<usize>>
    where
        S: Data<Elem = f64>,
    {
        self.classify_batch_with_probabilities(data)
            .map(|(labels, _)| labels)
    }

    /// Labels plus a `C × N` matrix of posteriors, one column per point.
    pub fn classify_batch_with_probabilities<S>(
        &self,
        data: &ArrayBase<S, Ix2>,
    ) -> Result<(Array1<usize>, Array2<f64>)>
    where
        S: Data<Elem = f64>,
    {
        let ll = self.log_likelihood_batch(data)?;
        let mut probabilities = Array2::zeros(ll.dim());
        let zip = Zip::from(probabilities.columns_mut()).and(ll.columns());
        if self.config.parallel {
            zip.par_for_each(|p, column| normalize_log_probabilities(column, p));
        } else {
            zip.for_each(|p, column| normalize_log_probabilities(column, p));
        }
        let labels =
            Zip::from(probabilities.columns()).map_collect(|column| argmax(column).unwrap_or(0));
        Ok((labels, probabilities))
    }

    /// Unnormalized log posterior of each class for `point`.
    pub fn log_likelihood<S>(&self, point: &ArrayBase<S, Ix1>) -> Result<Array1<f64>>
    where
        S: Data<Elem = f64>,
    {
        self.check_classifiable(point.len())?;
        Ok(self.evaluator().evaluate(point.view()))
    }

    /// `C × N` unnormalized log posteriors for the `D × N` batch `data`.
    pub fn log_likelihood_batch<S>(&self, data: &ArrayBase<S, Ix2>) -> Result<Array2<f64>>
    where
        S: Data<Elem = f64>,
    {
        self.check_classifiable(data.nrows())?;
        Ok(self.evaluator().evaluate_batch(data.view(), self.config.parallel))
    }

    /// Replaces the model with a checked parameter set.
    ///
    /// Shapes must agree, variances must be finite and at least the
    /// configured floor, and priors must sum to one and match
    /// `per_class_count / training_point_count`.
    pub fn load_parameters(&mut self, params: ModelParameters) -> Result<()> {
        self.model = ModelState::from_parameters(params, &self.config)?;
        Ok(())
    }

    pub fn parameters(&self) -> ModelParameters {
        self.model.to_parameters()
    }

    pub fn means(&self) -> ArrayView2<'_, f64> {
        self.model.means()
    }

    pub fn variances(&self) -> ArrayView2<'_, f64> {
        self.model.variances()
    }

    pub fn priors(&self) -> Array1<f64> {
        self.model.priors()
    }

    pub fn per_class_count(&self) -> Vec<u64> {
        self.model.per_class_count()
    }

    pub fn training_point_count(&self) -> u64 {
        self.model.training_point_count()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_trained()
    }

    pub fn dimensionality(&self) -> usize {
        self.model.dimensionality()
    }

    pub fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    pub fn config(&self) -> &NaiveBayesConfig {
        &self.config
    }

    fn evaluator(&self) -> GaussianLogLikelihood<'_> {
        let priors = self.model.priors();
        GaussianLogLikelihood::new(self.model.means(), self.model.variances(), priors.view())
    }

    /// Per-class `(count, mean, M2)` of a block, computed with the
    /// configured variance mode.
    fn block_aggregates(
        &self,
        data: ArrayView2<'_, f64>,
        labels: &[usize],
        classes: usize,
    ) -> Result<Vec<GaussianEstimator>> {
        let mut columns_per_class = vec![Vec::new(); classes];
        for (j, &label) in labels.iter().enumerate() {
            columns_per_class[label].push(j);
        }

        let mode = self.config.variance_mode;
        if self.config.parallel {
            columns_per_class
                .par_iter()
                .map(|columns| GaussianEstimator::from_columns(data, columns, mode))
                .collect()
        } else {
            columns_per_class
                .iter()
                .map(|columns| GaussianEstimator::from_columns(data, columns, mode))
                .collect()
        }
    }

    /// Shape the next training call works with: an untrained model takes
    /// any dimension it has left at zero from the incoming data.
    fn target_shape(&self, dimensionality: usize, classes: usize) -> (usize, usize) {
        if self.model.is_trained() {
            return (self.dimensionality(), self.num_classes());
        }
        let d = match self.dimensionality() {
            0 => dimensionality,
            d => d,
        };
        let c = match self.num_classes() {
            0 => classes,
            c => c,
        };
        (d, c)
    }

    fn check_classifiable(&self, found: usize) -> Result<()> {
        check_dimensionality(self.dimensionality(), found)?;
        if self.num_classes() == 0 {
            return Err(no_classes());
        }
        if !self.model.is_trained() {
            warn!("classifying with an untrained model; results are meaningless");
        }
        Ok(())
    }
}

impl Classifier for NaiveBayesClassifier {
    fn votes_for_point(&self, point: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        self.classify_with_probabilities(&point)
            .map(|(_, probabilities)| probabilities)
    }

    fn train_on_point(&mut self, point: ArrayView1<'_, f64>, label: usize) -> Result<()> {
        self.train_point(&point, label)
    }
}

fn check_dimensionality(expected: usize, found: usize) -> Result<()> {
    if found != expected {
        return Err(ClassifierError::DimensionMismatch { expected, found });
    }
    Ok(())
}

fn infer_classes(labels: &[usize]) -> usize {
    labels.iter().max().map_or(0, |&l| l + 1)
}

fn no_classes() -> ClassifierError {
    ClassifierError::InvalidState("model has no classes".into())
}
