pub mod classifiers;
pub mod core;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use crate::classifiers::bayes::{ModelParameters, NaiveBayesClassifier, NaiveBayesConfig};
pub use crate::classifiers::Classifier;
pub use crate::core::error::{ClassifierError, Result};
pub use crate::core::estimators::{GaussianEstimator, VarianceEstimator, VarianceMode};
