use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("dimension mismatch: model expects {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("label {label} out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },

    #[error("length mismatch: {points} points but {labels} labels")]
    LengthMismatch { points: usize, labels: usize },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
