/// One-shot historical import.
///
/// Bootstraps the reading store from an external multi-city daily CSV
/// (the Kaggle "Air Quality Data in India" `city_day.csv` layout). Rows
/// are filtered to the configured city, source columns are renamed onto
/// the canonical schema, and the result replaces the store wholesale.
///
/// Duplicate dates within the city are resolved keep-last: the last row
/// for a date in source order wins, placed where that date first appeared.

use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;
use crate::model::{FEATURE_COUNT, PipelineError, Reading};
use crate::store::{ReadingStore, parse_cell};

/// Source column holding the city name.
pub const CITY_COLUMN: &str = "City";

/// Source column → canonical column, in canonical order.
pub const COLUMN_MAP: [(&str, &str); 10] = [
    ("Date", "timestamp"),
    ("AQI", "aqi"),
    ("CO", "co"),
    ("NO", "no"),
    ("NO2", "no2"),
    ("O3", "o3"),
    ("SO2", "so2"),
    ("PM2.5", "pm2_5"),
    ("PM10", "pm10"),
    ("NH3", "nh3"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    /// Rows matching the target city in the source file.
    pub city_rows: usize,
    /// Rows dropped because a later row carried the same date.
    pub duplicates_dropped: usize,
    /// Rows written to the store.
    pub written: usize,
}

// ---------------------------------------------------------------------------
// Reading the source
// ---------------------------------------------------------------------------

/// Reads every source row for `city`, already mapped onto the canonical schema.
pub fn read_city_rows(source: &Path, city: &str) -> Result<Vec<Reading>, PipelineError> {
    if !source.exists() {
        return Err(PipelineError::MissingPrerequisite {
            what: "Historical file".to_string(),
            path: source.display().to_string(),
            hint: "Download city_day.csv and point paths.history_source at it.".to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new().from_path(source)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    };

    let city_idx = position(CITY_COLUMN)?;
    let mapped_idx = COLUMN_MAP
        .iter()
        .map(|(source_name, _)| position(source_name))
        .collect::<Result<Vec<usize>, _>>()?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.get(city_idx).map(str::trim) != Some(city) {
            continue;
        }

        let mut values = [None; FEATURE_COUNT + 1];
        for (slot, (idx, (source_name, _))) in values
            .iter_mut()
            .zip(mapped_idx[1..].iter().zip(&COLUMN_MAP[1..]))
        {
            let raw = record.get(*idx).unwrap_or_default();
            *slot = parse_cell(raw).map_err(|e| {
                PipelineError::ParseError(format!("line {} column '{}': '{}' {}", line + 2, source_name, raw, e))
            })?;
        }

        let timestamp = record.get(mapped_idx[0]).unwrap_or_default().trim();
        let [aqi, features @ ..] = values;
        rows.push(Reading::new(timestamp, aqi, features));
    }

    if rows.is_empty() {
        return Err(PipelineError::CityNotFound(city.to_string()));
    }
    Ok(rows)
}

/// Keeps the last row per timestamp, at the position the timestamp first appeared.
pub fn dedup_keep_last(rows: Vec<Reading>) -> Vec<Reading> {
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<Reading> = Vec::with_capacity(rows.len());

    for row in rows {
        match slot_of.get(&row.timestamp) {
            Some(&slot) => kept[slot] = row,
            None => {
                slot_of.insert(row.timestamp.clone(), kept.len());
                kept.push(row);
            }
        }
    }
    kept
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Replaces `store` with the deduplicated rows for `city` from `source`.
///
/// The store is untouched unless the source was read successfully.
pub fn import_history(source: &Path, city: &str, store: &ReadingStore) -> Result<ImportSummary, PipelineError> {
    let rows = read_city_rows(source, city)?;
    let city_rows = rows.len();
    let rows = dedup_keep_last(rows);
    let written = store.replace_all(&rows)?;

    Ok(ImportSummary {
        city_rows,
        duplicates_dropped: city_rows - written,
        written,
    })
}

/// Runs the import with the configured paths and target city.
pub fn run(config: &Config) -> Result<ImportSummary, PipelineError> {
    import_history(
        &config.paths.history_source,
        &config.location.target_city,
        &ReadingStore::new(&config.paths.store),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
