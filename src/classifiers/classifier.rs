use ndarray::{Array1, ArrayView1};

use crate::core::error::{ClassifierError, Result};
use crate::utils::math::argmax;

/// Online classifier over dense numeric points.
pub trait Classifier {
    /// Posterior probability of each class for `point`.
    fn votes_for_point(&self, point: ArrayView1<'_, f64>) -> Result<Array1<f64>>;

    fn train_on_point(&mut self, point: ArrayView1<'_, f64>, label: usize) -> Result<()>;

    /// Class with the most votes; ties go to the lowest index.
    fn predict_point(&self, point: ArrayView1<'_, f64>) -> Result<usize> {
        let votes = self.votes_for_point(point)?;
        argmax(votes.view())
            .ok_or_else(|| ClassifierError::InvalidState("classifier produced no votes".into()))
    }
}
