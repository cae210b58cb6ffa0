/// Point predictions from the persisted model.
///
/// A feature vector is aligned onto the canonical pollutant order, passed
/// through the forest, rounded to two decimals, and mapped to a severity
/// band.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::category::AqiCategory;
use crate::config::Config;
use crate::model::{FEATURES, FEATURE_COUNT, PipelineError};
use crate::training::ModelArtifact;
use crate::training::forest::FeatureRow;

/// Pollutant name → concentration. Keys outside `FEATURES` are ignored.
pub type FeatureVector = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Model output rounded to two decimals.
    pub aqi: f64,
    pub category: AqiCategory,
}

impl Prediction {
    pub fn from_raw(raw: f64) -> Self {
        let aqi = round2(raw);
        Self {
            aqi,
            category: AqiCategory::from_aqi(aqi),
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (AQI: {})", self.category, self.aqi)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Restricts and reorders `vector` to `FEATURES`.
///
/// A missing field is an error; it is never defaulted.
pub fn align_features(vector: &FeatureVector) -> Result<FeatureRow, PipelineError> {
    let mut row = [0.0; FEATURE_COUNT];
    for (slot, name) in row.iter_mut().zip(FEATURES) {
        *slot = *vector
            .get(name)
            .ok_or_else(|| PipelineError::MissingFeature(name.to_string()))?;
    }
    Ok(row)
}

/// Two-line markdown table of an aligned row, for console output.
pub fn feature_table(row: &FeatureRow) -> String {
    let header = FEATURES.join(" | ");
    let divider = FEATURES.iter().map(|f| "-".repeat(f.len().max(3))).collect::<Vec<_>>().join(" | ");
    let values = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" | ");
    format!("| {} |\n| {} |\n| {} |", header, divider, values)
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

pub struct Predictor {
    artifact: ModelArtifact,
}

impl Predictor {
    /// Loads the model; fails with guidance if training has not run yet.
    pub fn load(model_path: &Path) -> Result<Self, PipelineError> {
        Ok(Self::from_artifact(ModelArtifact::load(model_path)?))
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    pub fn predict(&self, vector: &FeatureVector) -> Result<Prediction, PipelineError> {
        let row = align_features(vector)?;
        Ok(self.predict_row(&row))
    }

    pub fn predict_row(&self, row: &FeatureRow) -> Prediction {
        Prediction::from_raw(self.artifact.forest.predict(row))
    }
}

/// A prediction together with the aligned input it was made from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePrediction {
    pub features: FeatureRow,
    pub prediction: Prediction,
}

/// Predicts the configured sample vector with the configured model.
pub fn run(config: &Config) -> Result<SamplePrediction, PipelineError> {
    let predictor = Predictor::load(&config.paths.model)?;
    let features = align_features(&config.predict.sample)?;
    Ok(SamplePrediction {
        features,
        prediction: predictor.predict_row(&features),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
