//! The training run: reading store in, model artifact and metrics record out.
//!
//! A run is all-or-nothing. Both output files are staged next to their
//! destinations and only renamed into place once the model has been fitted
//! and evaluated; any earlier failure leaves existing artifacts untouched.

use chrono::Utc;
use std::path::Path;

use super::artifact::ModelArtifact;
use super::forest::{FeatureRow, ForestParams, RandomForest, TreeParams};
use super::impute::MeanImputer;
use super::metrics::{format_metrics, mean_absolute_error};
use super::split::train_test_split;
use crate::config::{Config, TrainingConfig};
use crate::logging::{self, Stage};
use crate::model::{FEATURES, PipelineError};
use crate::store::{ReadingStore, StagedFile};

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub total_rows: usize,
    pub labelled_rows: usize,
    pub train_rows: usize,
    pub eval_rows: usize,
    /// `false` when the full set doubled as the evaluation set.
    pub holdout: bool,
    /// Canonical columns absent from the store, imputed as all-missing.
    pub synthesized: Vec<String>,
    pub mae: f64,
}

impl From<&TrainingConfig> for ForestParams {
    fn from(cfg: &TrainingConfig) -> Self {
        ForestParams {
            n_trees: cfg.n_trees,
            seed: cfg.seed,
            tree: TreeParams {
                max_depth: cfg.max_depth,
                min_samples_split: cfg.min_samples_split,
            },
        }
    }
}

/// Trains with the configured store, artifact paths and hyper-parameters.
pub fn run(config: &Config) -> Result<TrainingReport, PipelineError> {
    train(
        &ReadingStore::new(&config.paths.store),
        &config.training,
        &config.paths.model,
        &config.paths.metrics,
    )
}

pub fn train(
    store: &ReadingStore,
    params: &TrainingConfig,
    model_path: &Path,
    metrics_path: &Path,
) -> Result<TrainingReport, PipelineError> {
    let loaded = store.load()?;
    let total_rows = loaded.readings.len();

    let labelled: Vec<_> = loaded
        .readings
        .iter()
        .filter_map(|r| r.aqi.map(|aqi| (r.features(), aqi)))
        .collect();
    if labelled.is_empty() {
        return Err(PipelineError::NoLabelledRows);
    }

    let raw: Vec<_> = labelled.iter().map(|(features, _)| *features).collect();
    let y: Vec<f64> = labelled.iter().map(|(_, aqi)| *aqi).collect();
    let (imputer, x) = MeanImputer::fit_transform(&raw);
    for col in &imputer.empty_columns {
        logging::warn(
            Stage::Train,
            Some(FEATURES[*col]),
            "column has no values at all; imputed with 0.0",
        );
    }

    let split = train_test_split(x.len(), params.test_fraction, params.seed, params.min_rows_for_split);
    if !split.holdout {
        logging::warn(
            Stage::Train,
            None,
            &format!(
                "Very few data samples ({}). Model will be weak; evaluating on the training rows.",
                x.len()
            ),
        );
    }

    let (x_train, y_train) = select(&x, &y, &split.train);
    let (x_eval, y_eval) = select(&x, &y, &split.eval);

    logging::info(
        Stage::Train,
        None,
        &format!("Training random forest ({} trees) on {} rows...", params.n_trees, x_train.len()),
    );
    let forest = RandomForest::fit(&x_train, &y_train, &ForestParams::from(params))?;

    let predictions = forest.predict_batch(&x_eval);
    let mae = mean_absolute_error(&y_eval, &predictions)
        .filter(|m| m.is_finite())
        .ok_or_else(|| PipelineError::ModelFormat("evaluation produced no finite MAE".to_string()))?;

    let artifact = ModelArtifact {
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
        forest,
        trained_at: Utc::now().to_rfc3339(),
        train_rows: x_train.len(),
        eval_rows: x_eval.len(),
        mae,
    };

    let staged_model = StagedFile::write(model_path, &artifact.to_json()?)?;
    let staged_metrics = StagedFile::write(metrics_path, format_metrics(mae).as_bytes())?;
    staged_model.commit()?;
    staged_metrics.commit()?;

    Ok(TrainingReport {
        total_rows,
        labelled_rows: x.len(),
        train_rows: x_train.len(),
        eval_rows: x_eval.len(),
        holdout: split.holdout,
        synthesized: loaded.synthesized,
        mae,
    })
}

fn select(x: &[FeatureRow], y: &[f64], indices: &[usize]) -> (Vec<FeatureRow>, Vec<f64>) {
    indices.iter().map(|&i| (x[i], y[i])).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FEATURE_COUNT, Reading};
    use std::fs;

    struct Paths {
        _dir: tempfile::TempDir,
        store: ReadingStore,
        model: std::path::PathBuf,
        metrics: std::path::PathBuf,
    }

    fn paths() -> Paths {
        let dir = tempfile::tempdir().unwrap();
        Paths {
            store: ReadingStore::new(dir.path().join("data").join("aqi_data.csv")),
            model: dir.path().join("models").join("model.json"),
            metrics: dir.path().join("models").join("metrics.txt"),
            _dir: dir,
        }
    }

    fn small_params() -> TrainingConfig {
        TrainingConfig { n_trees: 10, ..TrainingConfig::default() }
    }

    fn complete_reading(i: usize) -> Reading {
        let base = i as f64;
        let features: [Option<f64>; FEATURE_COUNT] =
            std::array::from_fn(|f| Some(base * (f + 1) as f64 + 0.5));
        Reading::new(format!("2024-05-{:02}", i + 1), Some(40.0 + base * 12.5), features)
    }

    #[test]
    fn test_twelve_complete_rows_produce_finite_mae_with_four_decimals() {
        let p = paths();
        let rows: Vec<Reading> = (0..12).map(complete_reading).collect();
        p.store.replace_all(&rows).unwrap();

        let report = train(&p.store, &small_params(), &p.model, &p.metrics).unwrap();

        assert!(report.holdout);
        assert_eq!((report.train_rows, report.eval_rows), (9, 3));
        assert!(report.mae.is_finite() && report.mae >= 0.0, "mae = {}", report.mae);

        let metrics = fs::read_to_string(&p.metrics).unwrap();
        let value = metrics
            .trim_end()
            .strip_prefix("Mean Absolute Error (MAE): ")
            .expect("metrics line prefix");
        let decimals = value.split('.').nth(1).expect("decimal point");
        assert_eq!(decimals.len(), 4, "metrics value '{}' should have 4 decimals", value);
        assert!(p.model.exists());
    }

    #[test]
    fn test_single_labelled_row_trains_on_full_set() {
        let p = paths();
        p.store.replace_all(&[complete_reading(0)]).unwrap();

        let report = train(&p.store, &small_params(), &p.model, &p.metrics).unwrap();

        assert!(!report.holdout);
        assert_eq!((report.train_rows, report.eval_rows), (1, 1));
        assert_eq!(report.mae, 0.0, "a one-row forest reproduces its own label");
    }

    #[test]
    fn test_no_labelled_rows_leaves_artifacts_untouched() {
        let p = paths();
        let mut unlabelled = complete_reading(0);
        unlabelled.aqi = None;
        p.store.replace_all(&[unlabelled]).unwrap();

        let result = train(&p.store, &small_params(), &p.model, &p.metrics);

        assert_eq!(result, Err(PipelineError::NoLabelledRows));
        assert!(!p.model.exists(), "model must not be created");
        assert!(!p.metrics.exists(), "metrics must not be created");
    }

    #[test]
    fn test_failed_run_does_not_modify_previous_artifacts() {
        let p = paths();
        fs::create_dir_all(p.model.parent().unwrap()).unwrap();
        fs::write(&p.model, "previous model").unwrap();
        fs::write(&p.metrics, "previous metrics").unwrap();

        let mut unlabelled = complete_reading(0);
        unlabelled.aqi = None;
        p.store.replace_all(&[unlabelled]).unwrap();
        assert!(train(&p.store, &small_params(), &p.model, &p.metrics).is_err());

        assert_eq!(fs::read_to_string(&p.model).unwrap(), "previous model");
        assert_eq!(fs::read_to_string(&p.metrics).unwrap(), "previous metrics");
    }

    #[test]
    fn test_missing_store_is_missing_prerequisite() {
        let p = paths();
        let result = train(&p.store, &small_params(), &p.model, &p.metrics);
        assert!(matches!(result, Err(PipelineError::MissingPrerequisite { .. })));
        assert!(!p.model.exists());
    }

    #[test]
    fn test_absent_feature_column_is_synthesized_and_imputed() {
        let p = paths();
        let mut text = String::from("timestamp,aqi,co,no,no2,o3,so2,pm2_5,pm10\n");
        for i in 0..5 {
            text.push_str(&format!("2024-05-0{},{},{},1,2,3,4,5,6\n", i + 1, 50 + i * 10, i));
        }
        fs::create_dir_all(p.store.path().parent().unwrap()).unwrap();
        fs::write(p.store.path(), text).unwrap();

        let report = train(&p.store, &small_params(), &p.model, &p.metrics).unwrap();

        assert_eq!(report.synthesized, vec!["nh3".to_string()]);
        assert!(report.mae.is_finite());
    }

    #[test]
    fn test_infinite_cells_fail_without_writing_artifacts() {
        let p = paths();
        fs::create_dir_all(p.store.path().parent().unwrap()).unwrap();
        fs::write(
            p.store.path(),
            "timestamp,aqi,co,no,no2,o3,so2,pm2_5,pm10,nh3\n\
             a,10,inf,1,1,1,1,1,1,1\n\
             b,90,-inf,1,1,1,1,1,1,1\n",
        )
        .unwrap();

        let params = TrainingConfig { n_trees: 100, ..TrainingConfig::default() };
        let result = train(&p.store, &params, &p.model, &p.metrics);

        assert!(matches!(result, Err(PipelineError::ParseError(_))), "got {:?}", result);
        assert!(!p.model.exists());
        assert!(!p.metrics.exists());
    }

    #[test]
    fn test_rows_without_label_are_dropped_before_fitting() {
        let p = paths();
        let mut rows: Vec<Reading> = (0..4).map(complete_reading).collect();
        rows[2].aqi = None;
        p.store.replace_all(&rows).unwrap();

        let report = train(&p.store, &small_params(), &p.model, &p.metrics).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.labelled_rows, 3);
    }

    #[test]
    fn test_artifact_reloads_with_canonical_features() {
        let p = paths();
        p.store.replace_all(&(0..12).map(complete_reading).collect::<Vec<_>>()).unwrap();
        let report = train(&p.store, &small_params(), &p.model, &p.metrics).unwrap();

        let artifact = ModelArtifact::load(&p.model).unwrap();
        assert_eq!(artifact.features, FEATURES);
        assert_eq!(artifact.forest.n_trees(), 10);
        assert_eq!(artifact.mae, report.mae);
    }
}
