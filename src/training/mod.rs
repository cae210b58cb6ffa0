/// Model training.
///
/// Submodules:
/// - `impute`: per-column mean imputation of missing features.
/// - `split`: seeded train/evaluation split with a small-data fallback.
/// - `forest`: the random forest regressor.
/// - `metrics`: mean absolute error and the metrics record file.
/// - `artifact`: the persisted model.
/// - `trainer`: the end-to-end training run.

pub mod artifact;
pub mod forest;
pub mod impute;
pub mod metrics;
pub mod split;
pub mod trainer;

pub use artifact::ModelArtifact;
pub use metrics::read_metrics;
pub use trainer::{TrainingReport, run, train};
