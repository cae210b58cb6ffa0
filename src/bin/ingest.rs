//! Ingestion stage: append the current observation to the reading store.
//!
//! Failures are logged and the run ends without appending; the next
//! scheduled invocation is the retry.

use aqi_service::config::Config;
use aqi_service::ingest::openweather;
use aqi_service::logging::{self, Stage};

fn main() {
    let Ok(config) = Config::load_for_stage() else {
        return;
    };

    let location = format!("{},{}", config.location.latitude, config.location.longitude);
    logging::info(
        Stage::Ingest,
        Some(&location),
        &format!("Starting data ingestion job (lat {}, lon {})...", config.location.latitude, config.location.longitude),
    );

    let result = openweather::build_client(&config.api)
        .and_then(|client| openweather::record_current(&config, &client));

    match result {
        Ok(reading) => logging::info(
            Stage::Store,
            Some(&config.paths.store.display().to_string()),
            &format!("Appended reading {} (AQI {:?})", reading.timestamp, reading.aqi),
        ),
        Err(e) => logging::log_ingest_failure(&location, "Fetch current observation", &e),
    }

    logging::info(Stage::Ingest, None, "Data ingestion job finished.");
}
