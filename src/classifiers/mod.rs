pub mod bayes;
pub mod classifier;

pub use bayes::NaiveBayesClassifier;
pub use classifier::Classifier;
