pub mod oracle_classifier;

pub use oracle_classifier::OracleClassifier;
