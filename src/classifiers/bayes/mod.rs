mod config;
pub mod log_likelihood;
mod model;
mod naive_bayes;

pub use config::{DEFAULT_VARIANCE_FLOOR, NaiveBayesConfig};
pub use model::{ModelParameters, PRIOR_TOLERANCE};
pub use naive_bayes::NaiveBayesClassifier;
