mod gaussian_estimator;
mod variance;

pub use gaussian_estimator::GaussianEstimator;
pub use variance::{VarianceEstimator, VarianceMode};
