//! The persisted model.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::forest::RandomForest;
use crate::model::{FEATURES, PipelineError};

/// A fitted forest plus the feature layout it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Feature names in the order the forest indexes them.
    pub features: Vec<String>,
    pub forest: RandomForest,
    /// RFC 3339 UTC time the model was fitted.
    pub trained_at: String,
    pub train_rows: usize,
    pub eval_rows: usize,
    pub mae: f64,
}

impl ModelArtifact {
    pub fn to_json(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Loads an artifact and checks its feature layout.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::MissingPrerequisite {
                what: "Model file".to_string(),
                path: path.display().to_string(),
                hint: "Please run the train stage first.".to_string(),
            });
        }

        let bytes = std::fs::read(path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::ModelFormat(format!("{}: {}", path.display(), e)))?;

        if artifact.features != FEATURES {
            return Err(PipelineError::ModelFormat(format!(
                "model features {:?} do not match {:?}",
                artifact.features, FEATURES
            )));
        }
        Ok(artifact)
    }
}
