//! Historical import stage: replace the reading store with one city's
//! history from the bulk CSV. Any failure exits non-zero so the operator
//! can fix the input and re-run.

use aqi_service::config::Config;
use aqi_service::history;
use aqi_service::logging::{self, Stage};

fn main() {
    let Ok(config) = Config::load_for_stage() else {
        std::process::exit(1);
    };

    let city = config.location.target_city.as_str();
    logging::info(Stage::Import, Some(city), &format!("Starting initial data preparation for {}...", city));

    match history::run(&config) {
        Ok(summary) => {
            if summary.duplicates_dropped > 0 {
                logging::warn(
                    Stage::Import,
                    Some(city),
                    &format!("Dropped {} duplicate date(s), keeping the last row for each", summary.duplicates_dropped),
                );
            }
            logging::info(
                Stage::Import,
                Some(city),
                &format!("Saved {} rows to {}", summary.written, config.paths.store.display()),
            );
        }
        Err(e) => {
            logging::error(Stage::Import, Some(city), &e.to_string());
            std::process::exit(1);
        }
    }
}
