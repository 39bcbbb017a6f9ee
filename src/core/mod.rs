pub mod error;
pub mod estimators;

pub use error::{ClassifierError, Result};
