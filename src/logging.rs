/// Structured logging for the air quality pipeline
///
/// Every message carries the stage that produced it and an optional
/// context id (a file path, a city, a coordinate). Output goes to the
/// console and, when configured, is appended to a log file so scheduled
/// runs leave a trail.

use chrono::Utc;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::config::LoggingConfig;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Import,
    Train,
    Predict,
    Store,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Import => write!(f, "IMPORT"),
            Stage::Train => write!(f, "TRAIN"),
            Stage::Predict => write!(f, "PREDICT"),
            Stage::Store => write!(f, "STORE"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the API has no observation for this hour yet
    Expected,
    /// Unexpected failure - credentials, server errors, or an API change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Creates the log file's directory up front so a configured path
    /// like `logs/pipeline.log` works on a fresh checkout.
    fn new(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) -> Self {
        if let Some(parent) = log_file.and_then(|f| Path::new(f).parent()) {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!("Failed to create log directory {}: {}", parent.display(), e);
                }
            }
        }
        Self {
            min_level,
            log_file: log_file.map(String::from),
            console_timestamps,
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let entry = format_entry(level, stage, context, message);
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, context_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Single-line log entry as written to the log file.
fn format_entry(level: LogLevel, stage: Stage, context: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, stage, context_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger::new(min_level, log_file, console_timestamps);
    if let Ok(mut slot) = LOGGER.lock() {
        *slot = Some(logger);
    }
}

/// Initialize the global logger from the `[logging]` config section
pub fn init_from_config(config: &LoggingConfig) {
    init_logger(config.min_level(), config.file.as_deref(), config.timestamps);
}

fn dispatch(level: LogLevel, stage: Stage, context: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, context, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, stage, context, message);
}

/// Log a warning message
pub fn warn(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, stage, context, message);
}

/// Log an error message
pub fn error(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, stage, context, message);
}

/// Log a debug message
pub fn debug(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, stage, context, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an ingestion failure from its rendered error message
pub fn classify_ingest_failure(error_message: &str) -> FailureType {
    if error_message.contains("Missing credential") {
        FailureType::Unexpected
    } else if error_message.contains("HTTP error: 5") || error_message.contains("Request failed") {
        // Server-side or network trouble; the next scheduled run retries
        FailureType::Unknown
    } else if error_message.contains("HTTP error") || error_message.contains("Parse error") {
        // 4xx or an unparseable body points at our request or an API change
        FailureType::Unexpected
    } else if error_message.contains("Malformed response") {
        // Missing or empty `list`: either no fresh observation or a changed payload
        FailureType::Unknown
    } else {
        FailureType::Unknown
    }
}

/// Level and message for an ingestion failure
fn ingest_failure_entry(operation: &str, err: &dyn std::error::Error) -> (LogLevel, String) {
    let error_msg = err.to_string();
    let failure_type = classify_ingest_failure(&error_msg);

    let level = match failure_type {
        FailureType::Expected => LogLevel::Info,
        FailureType::Unexpected => LogLevel::Error,
        FailureType::Unknown => LogLevel::Warning,
    };
    (level, format!("{} failed [{}]: {}", operation, failure_type, error_msg))
}

/// Log an ingestion failure with automatic classification
///
/// Every class lands at `Info` or above: a run that appends nothing
/// always leaves a visible line.
pub fn log_ingest_failure(location: &str, operation: &str, err: &dyn std::error::Error) {
    let (level, message) = ingest_failure_entry(operation, err);
    dispatch(level, Stage::Ingest, Some(location), &message);
}

// ---------------------------------------------------------------------------
// Training Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a completed training run
pub fn log_training_summary(train_rows: usize, eval_rows: usize, mae: f64, synthesized: &[String]) {
    let message = format!(
        "Training complete: {} train rows, {} eval rows, MAE {:.4}",
        train_rows, eval_rows, mae
    );
    info(Stage::Train, None, &message);

    if !synthesized.is_empty() {
        warn(
            Stage::Train,
            None,
            &format!("Columns absent from the store were imputed: {}", synthesized.join(", ")),
        );
    }
}
