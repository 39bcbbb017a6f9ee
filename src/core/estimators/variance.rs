use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumMessage, EnumString, IntoStaticStr};

/// How a batch of points is reduced to `(count, mean, M2)`.
///
/// - `TwoPass` computes the mean first, then the squared deviations from it.
///   Two sweeps over the data, but each sweep is a plain sum and vectorizes well.
/// - `Online` feeds the points one at a time through Welford's update.
///   One sweep, more arithmetic per point, and no catastrophic cancellation
///   when the mean is large relative to the spread.
///
/// Both produce the same aggregate up to floating point rounding.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumIter,
    EnumString,
    EnumMessage,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VarianceMode {
    #[default]
    #[strum(message = "Two-pass mean then squared deviations")]
    TwoPass,
    #[strum(message = "Single-pass Welford update")]
    Online,
}

/// Denominator applied to `M2` when turning it into a variance.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumIter,
    EnumString,
    EnumMessage,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VarianceEstimator {
    /// `M2 / n`
    #[strum(message = "Population variance (M2 / n)")]
    Biased,
    /// `M2 / (n - 1)`
    #[default]
    #[strum(message = "Sample variance (M2 / (n - 1))")]
    Unbiased,
}

impl VarianceEstimator {
    /// Returns `None` when `count` is too small for this estimator, in which
    /// case the variance is taken as zero before flooring.
    #[inline]
    pub fn denominator(self, count: u64) -> Option<f64> {
        match self {
            VarianceEstimator::Biased if count > 0 => Some(count as f64),
            VarianceEstimator::Unbiased if count > 1 => Some((count - 1) as f64),
            _ => None,
        }
    }
}
