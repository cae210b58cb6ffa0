/// Runtime configuration for every pipeline stage.
///
/// A single `Config` is built once per process and passed explicitly into
/// each stage. Values come from a TOML file (path in `AQI_CONFIG`, else
/// `./aqi.toml`), falling back to the defaults below for anything not set.
/// The defaults describe the Mumbai deployment.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::logging::{self, LogLevel, Stage};
use crate::model::PipelineError;

/// Env var naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AQI_CONFIG";

/// Config file looked up in the working directory when `AQI_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "aqi.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub training: TrainingConfig,
    pub predict: PredictConfig,
    pub logging: LoggingConfig,
}

/// The single monitored location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// WGS84 latitude queried by the ingestion stage.
    pub latitude: f64,
    /// WGS84 longitude queried by the ingestion stage.
    pub longitude: f64,
    /// `City` value kept by the historical import.
    pub target_city: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 19.0760,
            longitude: 72.8777,
            target_city: "Mumbai".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub store: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
    /// External bulk file read once by the historical import.
    pub history_source: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from("data/raw/aqi_data.csv"),
            model: PathBuf::from("models/model.json"),
            metrics: PathBuf::from("models/metrics.txt"),
            history_source: PathBuf::from("../city_day.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.openweathermap.org/data/2.5/air_pollution".to_string(),
            api_key_env: "OPENWEATHER_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Random forest and split settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_trees: usize,
    pub seed: u64,
    pub test_fraction: f64,
    /// Below this many labelled rows the full set is used for both fit and evaluation.
    pub min_rows_for_split: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            test_fraction: 0.2,
            min_rows_for_split: 10,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Input for the `predict` binary, which takes no arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictConfig {
    pub sample: BTreeMap<String, f64>,
}

impl Default for PredictConfig {
    fn default() -> Self {
        let sample = [
            ("co", 500.68),
            ("no", 1.58),
            ("no2", 10.33),
            ("o3", 35.77),
            ("so2", 3.65),
            ("pm2_5", 14.23),
            ("pm10", 20.72),
            ("nh3", 5.86),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
        Self { sample }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of "debug", "info", "warn", "error".
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    /// Parsed minimum level; unknown names fall back to `Info`.
    pub fn min_level(&self) -> LogLevel {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parses a TOML document. Missing sections and keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Resolves the config for a stage binary.
    ///
    /// Loads `.env` first so `AQI_CONFIG` and the API key may live there.
    /// An explicitly named file must exist; the implicit `aqi.toml` is
    /// optional.
    pub fn load() -> Result<Self, PipelineError> {
        dotenv::dotenv().ok();

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads the config and starts the logger from its `[logging]` section.
    ///
    /// A config that cannot be loaded is reported under the system stage
    /// through a default console logger before the error is returned.
    pub fn load_for_stage() -> Result<Self, PipelineError> {
        Self::start_logging(Self::load())
    }

    fn start_logging(loaded: Result<Self, PipelineError>) -> Result<Self, PipelineError> {
        match &loaded {
            Ok(config) => {
                logging::init_from_config(&config.logging);
                logging::debug(Stage::System, None, "Configuration loaded");
            }
            Err(e) => {
                logging::init_from_config(&LoggingConfig::default());
                logging::error(Stage::System, Some("config"), &e.to_string());
            }
        }
        loaded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_mumbai_deployment() {
        let config = Config::default();
        assert_eq!(config.location.target_city, "Mumbai");
        assert_eq!(config.location.latitude, 19.0760);
        assert_eq!(config.location.longitude, 72.8777);
        assert_eq!(config.training.n_trees, 100);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.min_rows_for_split, 10);
        assert_eq!(config.api.api_key_env, "OPENWEATHER_API_KEY");
    }

    #[test]
    fn test_partial_toml_keeps_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            [location]
            target_city = "Delhi"

            [paths]
            store = "/tmp/delhi.csv"
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.location.target_city, "Delhi");
        assert_eq!(config.location.latitude, 19.0760, "unset keys keep defaults");
        assert_eq!(config.paths.store, PathBuf::from("/tmp/delhi.csv"));
        assert_eq!(config.paths.model, PathBuf::from("models/model.json"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = Config::from_toml_str("[location\nlatitude = ");
        assert!(matches!(result, Err(PipelineError::Config(_))), "got {:?}", result);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let result = Config::from_file(Path::new("/nonexistent/aqi.toml"));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_default_predict_sample_covers_every_feature() {
        let sample = PredictConfig::default().sample;
        for name in crate::model::FEATURES {
            assert!(sample.contains_key(name), "sample missing '{}'", name);
        }
    }

    #[test]
    fn test_log_level_names() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.min_level(), LogLevel::Info);
        logging.level = "WARN".to_string();
        assert_eq!(logging.min_level(), LogLevel::Warning);
        logging.level = "debug".to_string();
        assert_eq!(logging.min_level(), LogLevel::Debug);
    }

    #[test]
    fn test_stage_startup_passes_config_through() {
        let loaded = Config::from_toml_str("[location]\ntarget_city = \"Pune\"\n");
        let config = Config::start_logging(loaded).expect("valid config is returned");
        assert_eq!(config.location.target_city, "Pune");
    }

    #[test]
    fn test_stage_startup_returns_config_error() {
        let loaded = Config::from_toml_str("[training]\nn_trees = \"many\"\n");
        let result = Config::start_logging(loaded);
        assert!(matches!(result, Err(PipelineError::Config(_))), "got {:?}", result.map(|c| c.training.n_trees));
    }
}
