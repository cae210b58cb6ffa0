//! Evaluation metric and the metrics record file.

use std::path::Path;

use crate::model::PipelineError;

/// Prefix of the single line written to the metrics record.
pub const MAE_LABEL: &str = "Mean Absolute Error (MAE): ";

/// Mean absolute error between labels and predictions.
///
/// Returns `None` for empty or mismatched inputs.
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    let total: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Some(total / y_true.len() as f64)
}

/// The metrics record body, MAE to four decimals.
pub fn format_metrics(mae: f64) -> String {
    format!("{}{:.4}\n", MAE_LABEL, mae)
}

/// Reads the MAE back from a metrics record.
pub fn read_metrics(path: &Path) -> Result<f64, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|_| PipelineError::MissingPrerequisite {
        what: "Metrics file".to_string(),
        path: path.display().to_string(),
        hint: "Run the train stage first.".to_string(),
    })?;

    text.lines()
        .find_map(|line| line.strip_prefix(MAE_LABEL))
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| PipelineError::ParseError(format!("no MAE line in {}", path.display())))
}
