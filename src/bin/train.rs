//! Training stage: fit the forest on the reading store and persist the
//! model and its MAE. On failure nothing is written.

use aqi_service::config::Config;
use aqi_service::logging::{self, Stage};
use aqi_service::training;

fn main() {
    let Ok(config) = Config::load_for_stage() else {
        return;
    };

    let store_path = config.paths.store.display().to_string();
    logging::info(Stage::Train, Some(&store_path), "Starting model training job...");

    match training::run(&config) {
        Ok(report) => {
            logging::log_training_summary(report.train_rows, report.eval_rows, report.mae, &report.synthesized);
            logging::info(Stage::Train, None, &format!("Model saved to {}", config.paths.model.display()));
            logging::info(Stage::Train, None, &format!("Metrics saved to {}", config.paths.metrics.display()));
        }
        Err(e) => logging::error(Stage::Train, Some(&store_path), &e.to_string()),
    }

    logging::info(Stage::Train, None, "Model training job finished.");
}
