//! Air quality pipeline: reading store, live ingestion, historical import,
//! random forest training and AQI prediction.
//!
//! Each stage is a separate binary under `src/bin/`:
//! - `ingest`: append the current observation to the store.
//! - `import_history`: bootstrap the store from a bulk historical CSV.
//! - `train`: fit and persist the model and its MAE.
//! - `predict`: predict and categorize the configured sample.

pub mod category;
pub mod config;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod predict;
pub mod store;
pub mod training;
