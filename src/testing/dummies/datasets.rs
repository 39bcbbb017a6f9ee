use ndarray::{Array2, s};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

/// `D × N` points with one label per column.
#[derive(Debug, Clone)]
pub struct LabeledData {
    pub data: Array2<f64>,
    pub labels: Vec<usize>,
}

impl LabeledData {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Columns `start..end` as their own block.
    pub fn block(&self, start: usize, end: usize) -> LabeledData {
        LabeledData {
            data: self.data.slice(s![.., start..end]).to_owned(),
            labels: self.labels[start..end].to_vec(),
        }
    }
}

/// Isotropic Gaussian blobs, `points_per_class` around each center, in a
/// seeded random order.
///
/// Panics if `std_dev` is negative or not finite.
pub fn gaussian_blobs(
    centers: &[Vec<f64>],
    std_dev: f64,
    points_per_class: usize,
    seed: u64,
) -> LabeledData {
    let dimensionality = centers.first().map_or(0, Vec::len);
    let noise = Normal::new(0.0, std_dev).expect("std_dev must be finite and non-negative");
    let mut rng = StdRng::seed_from_u64(seed);

    let mut labels: Vec<usize> = (0..centers.len())
        .flat_map(|c| std::iter::repeat_n(c, points_per_class))
        .collect();
    labels.shuffle(&mut rng);

    let data = Array2::from_shape_fn((dimensionality, labels.len()), |(i, j)| {
        centers[labels[j]][i] + rng.sample(noise)
    });

    LabeledData { data, labels }
}

/// Two unit-variance clusters around `(0, 0)` (class 0) and `(10, 10)` (class 1).
pub fn separated_clusters(points_per_class: usize, seed: u64) -> LabeledData {
    gaussian_blobs(&[vec![0.0, 0.0], vec![10.0, 10.0]], 1.0, points_per_class, seed)
}
