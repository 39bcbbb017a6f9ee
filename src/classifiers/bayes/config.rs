use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};

use crate::core::error::{ClassifierError, Result};
use crate::core::estimators::{VarianceEstimator, VarianceMode};

pub const DEFAULT_VARIANCE_FLOOR: f64 = 1e-9;

fn default_variance_floor() -> f64 {
    DEFAULT_VARIANCE_FLOOR
}
fn default_parallel() -> bool {
    true
}

/// Training and evaluation options for [`NaiveBayesClassifier`](super::NaiveBayesClassifier).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NaiveBayesConfig {
    #[serde(default)]
    #[schemars(
        title = "Variance mode",
        description = "How batch training reduces each class to (count, mean, M2)."
    )]
    pub variance_mode: VarianceMode,

    #[serde(default)]
    #[schemars(
        title = "Variance estimator",
        description = "Divide M2 by n (biased) or n - 1 (unbiased)."
    )]
    pub variance_estimator: VarianceEstimator,

    #[serde(default = "default_variance_floor")]
    #[schemars(
        title = "Variance floor",
        description = "Smallest variance any class-feature pair may take.",
        default = "default_variance_floor"
    )]
    pub variance_floor: f64,

    #[serde(default = "default_parallel")]
    #[schemars(
        title = "Parallel",
        description = "Evaluate batch classification and per-class aggregation on the rayon pool.",
        default = "default_parallel"
    )]
    pub parallel: bool,
}

impl Default for NaiveBayesConfig {
    fn default() -> Self {
        Self {
            variance_mode: VarianceMode::default(),
            variance_estimator: VarianceEstimator::default(),
            variance_floor: default_variance_floor(),
            parallel: default_parallel(),
        }
    }
}

impl NaiveBayesConfig {
    pub fn with_variance_mode(mut self, mode: VarianceMode) -> Self {
        self.variance_mode = mode;
        self
    }

    pub fn with_variance_estimator(mut self, estimator: VarianceEstimator) -> Self {
        self.variance_estimator = estimator;
        self
    }

    pub fn with_variance_floor(mut self, floor: f64) -> Self {
        self.variance_floor = floor;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err(ClassifierError::InvalidParameters(format!(
                "variance floor must be finite and positive, got {}",
                self.variance_floor
            )));
        }
        Ok(())
    }

    /// Parses a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NaiveBayesConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn schema() -> Schema {
        schema_for!(NaiveBayesConfig)
    }
}
