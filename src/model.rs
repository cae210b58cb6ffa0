/// Core data types for the air quality pipeline.
///
/// This module defines the shared domain model imported by every stage:
/// the canonical column layout of the reading store, the `Reading` row
/// type, and the `PipelineError` taxonomy. It contains no I/O.

// ---------------------------------------------------------------------------
// Canonical schema
// ---------------------------------------------------------------------------

/// Name of the label column.
pub const TARGET: &str = "aqi";

/// Name of the timestamp column.
pub const TIMESTAMP: &str = "timestamp";

/// The eight pollutant features, in the order the model consumes them.
pub const FEATURES: [&str; 8] = ["co", "no", "no2", "o3", "so2", "pm2_5", "pm10", "nh3"];

/// Number of pollutant features.
pub const FEATURE_COUNT: usize = FEATURES.len();

/// Every column of the reading store, in file order.
pub const COLUMNS: [&str; 10] = [
    TIMESTAMP, TARGET, "co", "no", "no2", "o3", "so2", "pm2_5", "pm10", "nh3",
];

// ---------------------------------------------------------------------------
// Reading type
// ---------------------------------------------------------------------------

/// One row of the reading store.
///
/// Field order matches `COLUMNS`; the csv writer relies on it when
/// serializing a row. Missing values are `None` and are written as empty
/// cells.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Reading {
    pub timestamp: String,
    pub aqi: Option<f64>,
    pub co: Option<f64>,
    pub no: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub so2: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub nh3: Option<f64>,
}

impl Reading {
    /// Builds a reading from a timestamp, label and features in `FEATURES` order.
    pub fn new(timestamp: impl Into<String>, aqi: Option<f64>, features: [Option<f64>; FEATURE_COUNT]) -> Self {
        let [co, no, no2, o3, so2, pm2_5, pm10, nh3] = features;
        Reading {
            timestamp: timestamp.into(),
            aqi,
            co,
            no,
            no2,
            o3,
            so2,
            pm2_5,
            pm10,
            nh3,
        }
    }

    /// Feature values in `FEATURES` order.
    pub fn features(&self) -> [Option<f64>; FEATURE_COUNT] {
        [
            self.co, self.no, self.no2, self.o3, self.so2, self.pm2_5, self.pm10, self.nh3,
        ]
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by any pipeline stage.
///
/// Each stage binary handles these at its own boundary.
#[derive(Debug, PartialEq)]
pub enum PipelineError {
    /// The API credential environment variable is not set.
    MissingCredential(String),
    /// The configuration file could not be read or parsed.
    Config(String),
    /// Non-2xx HTTP response from the air pollution API.
    HttpError(u16),
    /// The HTTP request itself failed (DNS, connect, timeout, ...).
    Request(String),
    /// The response body parsed but lacked the expected structure.
    MalformedResponse(String),
    /// A body or cell could not be parsed.
    ParseError(String),
    /// A file this stage depends on has not been produced yet.
    MissingPrerequisite {
        what: String,
        path: String,
        hint: String,
    },
    /// The reading store exists but holds no rows.
    EmptyDataset(String),
    /// No row carries an AQI label.
    NoLabelledRows,
    /// The historical file has no rows for the requested city.
    CityNotFound(String),
    /// A source file lacks a column the import mapping requires.
    MissingColumn(String),
    /// A feature vector lacks one of the canonical pollutants.
    MissingFeature(String),
    /// The model artifact does not match the canonical feature layout.
    ModelFormat(String),
    Io(String),
    Csv(String),
    Serialization(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::MissingCredential(var) => {
                write!(f, "Missing credential: environment variable {} is not set", var)
            }
            PipelineError::Config(msg) => write!(f, "Config error: {}", msg),
            PipelineError::HttpError(code) => write!(f, "HTTP error: {}", code),
            PipelineError::Request(msg) => write!(f, "Request failed: {}", msg),
            PipelineError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            PipelineError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            PipelineError::MissingPrerequisite { what, path, hint } => {
                write!(f, "{} not found at {}. {}", what, path, hint)
            }
            PipelineError::EmptyDataset(path) => write!(f, "Data file {} is empty", path),
            PipelineError::NoLabelledRows => {
                write!(f, "No valid data to train on after dropping rows without an AQI label")
            }
            PipelineError::CityNotFound(city) => write!(f, "No data found for city '{}'", city),
            PipelineError::MissingColumn(col) => write!(f, "Source is missing column '{}'", col),
            PipelineError::MissingFeature(name) => {
                write!(f, "Feature vector is missing required field '{}'", name)
            }
            PipelineError::ModelFormat(msg) => write!(f, "Model format error: {}", msg),
            PipelineError::Io(msg) => write!(f, "I/O error: {}", msg),
            PipelineError::Csv(msg) => write!(f, "CSV error: {}", msg),
            PipelineError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => PipelineError::HttpError(status.as_u16()),
            None => PipelineError::Request(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
