//! Prediction stage: predict the AQI of the configured sample vector and
//! report its severity band.

use aqi_service::config::Config;
use aqi_service::logging::{self, Stage};
use aqi_service::predict;

fn main() {
    let Ok(config) = Config::load_for_stage() else {
        return;
    };

    let model_path = config.paths.model.display().to_string();
    logging::info(Stage::Predict, Some(&model_path), "Loading model...");

    let result = match predict::run(&config) {
        Ok(result) => result,
        Err(e) => {
            logging::error(Stage::Predict, Some(&model_path), &e.to_string());
            return;
        }
    };

    println!("\nMaking prediction for the following data:");
    println!("{}", predict::feature_table(&result.features));

    println!("\n{}", "=".repeat(30));
    println!("  Prediction Result: {}", result.prediction);
    println!("{}", "=".repeat(30));
}
