mod datasets;

pub use datasets::{LabeledData, gaussian_blobs, separated_clusters};
