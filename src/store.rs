/// The reading store: one CSV file of timestamped pollutant readings.
///
/// The file is append-only during normal operation. Ingestion adds exactly
/// one row per run and never rewrites the header or earlier rows; only the
/// historical import replaces the file wholesale. Both writers hold an
/// exclusive lock on a sidecar `<store>.lock` file, so overlapping runs
/// are serialized instead of interleaving rows.
///
/// # Schema reconciliation
/// Loading goes through `reconcile`, which maps whatever header the file
/// carries onto the canonical `COLUMNS`. A canonical column absent from the
/// file becomes all-missing and is reported in `LoadedStore::synthesized`;
/// extra columns are ignored.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::model::{COLUMNS, FEATURES, FEATURE_COUNT, PipelineError, Reading, TARGET, TIMESTAMP};

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReadingStore {
    path: PathBuf,
}

/// Result of loading and reconciling the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedStore {
    pub readings: Vec<Reading>,
    /// Canonical columns the file header did not contain.
    pub synthesized: Vec<String>,
}

impl ReadingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Appends one reading, creating the file with a header if needed.
    pub fn append(&self, reading: &Reading) -> Result<(), PipelineError> {
        ensure_parent_dir(&self.path)?;
        let _lock = self.lock()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(COLUMNS)?;
        }
        writer.serialize(reading)?;
        writer.flush()?;
        Ok(())
    }

    /// Replaces the whole store with `readings`, header included.
    ///
    /// The new content is written to a sibling file and renamed over the
    /// store, so a crash mid-write leaves the previous store intact.
    pub fn replace_all(&self, readings: &[Reading]) -> Result<usize, PipelineError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(COLUMNS)?;
        for reading in readings {
            writer.serialize(reading)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PipelineError::Io(e.to_string()))?;

        ensure_parent_dir(&self.path)?;
        let _lock = self.lock()?;
        StagedFile::write(&self.path, &bytes)?.commit()?;
        Ok(readings.len())
    }

    /// Number of data rows, excluding the header. Zero if the file is absent.
    pub fn row_count(&self) -> Result<usize, PipelineError> {
        if !self.exists() {
            return Ok(0);
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Loads every row and reconciles it onto the canonical schema.
    pub fn load(&self) -> Result<LoadedStore, PipelineError> {
        if !self.exists() {
            return Err(PipelineError::MissingPrerequisite {
                what: "Data file".to_string(),
                path: self.path.display().to_string(),
                hint: "Run the ingest or import_history stage first.".to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new().from_path(&self.path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?);
        }

        if records.is_empty() {
            return Err(PipelineError::EmptyDataset(self.path.display().to_string()));
        }

        reconcile(&headers, &records)
    }

    fn lock(&self) -> Result<File, PipelineError> {
        let lock_path = sidecar(&self.path, "lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// Schema reconciliation
// ---------------------------------------------------------------------------

/// Maps raw records onto `Reading`s by header name.
///
/// Required columns unknown to the header become all-missing; their names
/// are returned in `synthesized` (the timestamp column is never reported,
/// it carries no numeric data). Empty, `NaN` and `NA` cells are missing.
pub fn reconcile(headers: &[String], records: &[csv::StringRecord]) -> Result<LoadedStore, PipelineError> {
    let index_of = |name: &str| headers.iter().position(|h| h == name);

    let timestamp_idx = index_of(TIMESTAMP);
    let target_idx = index_of(TARGET);
    let feature_idx: Vec<Option<usize>> = FEATURES.iter().map(|f| index_of(f)).collect();

    let synthesized: Vec<String> = std::iter::once(TARGET)
        .chain(FEATURES)
        .filter(|name| index_of(name).is_none())
        .map(String::from)
        .collect();

    let mut readings = Vec::with_capacity(records.len());
    for (row, record) in records.iter().enumerate() {
        let cell = |idx: Option<usize>, column: &str| -> Result<Option<f64>, PipelineError> {
            match idx.and_then(|i| record.get(i)) {
                Some(raw) => parse_cell(raw).map_err(|e| {
                    PipelineError::ParseError(format!("row {} column '{}': '{}' {}", row + 1, column, raw, e))
                }),
                None => Ok(None),
            }
        };

        let timestamp = timestamp_idx
            .and_then(|i| record.get(i))
            .unwrap_or_default()
            .to_string();
        let aqi = cell(target_idx, TARGET)?;

        let mut features = [None; FEATURE_COUNT];
        for (slot, (idx, name)) in features.iter_mut().zip(feature_idx.iter().zip(FEATURES)) {
            *slot = cell(*idx, name)?;
        }

        readings.push(Reading::new(timestamp, aqi, features));
    }

    Ok(LoadedStore { readings, synthesized })
}

/// Why a cell could not be read as a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellError {
    NotANumber,
    /// `inf` and friends parse as floats but are not measurements.
    NotFinite,
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellError::NotANumber => write!(f, "is not a number"),
            CellError::NotFinite => write!(f, "is not a finite number"),
        }
    }
}

/// Parses one numeric cell. Blank and NaN-like markers are missing;
/// infinities are rejected.
pub fn parse_cell(raw: &str) -> Result<Option<f64>, CellError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    let value: f64 = trimmed.parse().map_err(|_| CellError::NotANumber)?;
    if value.is_nan() {
        Ok(None)
    } else if value.is_infinite() {
        Err(CellError::NotFinite)
    } else {
        Ok(Some(value))
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Content written next to its destination but not yet renamed into place.
///
/// Dropping an uncommitted `StagedFile` removes the temporary file, so an
/// early return never leaves partial artifacts behind.
pub(crate) struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub(crate) fn write(dest: &Path, contents: &[u8]) -> Result<Self, PipelineError> {
        ensure_parent_dir(dest)?;
        let tmp = sidecar(dest, "tmp");
        fs::write(&tmp, contents)?;
        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
            committed: false,
        })
    }

    pub(crate) fn commit(mut self) -> Result<(), PipelineError> {
        fs::rename(&self.tmp, &self.dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "timestamp,aqi,co,no,no2,o3,so2,pm2_5,pm10,nh3";

    fn reading(ts: &str, aqi: Option<f64>) -> Reading {
        Reading::new(
            ts,
            aqi,
            [Some(500.68), Some(1.58), Some(10.33), Some(35.77), Some(3.65), Some(14.23), Some(20.72), Some(5.86)],
        )
    }

    #[test]
    fn test_first_append_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::new(dir.path().join("raw").join("aqi_data.csv"));

        store.append(&reading("2024-05-01T12:00:00", Some(3.0))).expect("append");

        let text = fs::read_to_string(store.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(
            lines.next(),
            Some("2024-05-01T12:00:00,3.0,500.68,1.58,10.33,35.77,3.65,14.23,20.72,5.86")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_append_preserves_prior_bytes_and_adds_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::new(dir.path().join("aqi_data.csv"));
        store.append(&reading("2024-05-01T12:00:00", Some(3.0))).unwrap();
        store.append(&reading("2024-05-01T13:00:00", None)).unwrap();

        let before = fs::read(store.path()).unwrap();
        let count_before = store.row_count().unwrap();

        store.append(&reading("2024-05-01T14:00:00", Some(2.0))).unwrap();

        let after = fs::read(store.path()).unwrap();
        assert_eq!(store.row_count().unwrap(), count_before + 1);
        assert!(after.starts_with(&before), "append must not rewrite existing bytes");
        let added = String::from_utf8(after[before.len()..].to_vec()).unwrap();
        assert_eq!(added.lines().count(), 1, "exactly one row appended, no second header");
        assert!(!added.contains("timestamp"));
    }

    #[test]
    fn test_missing_values_are_written_as_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::new(dir.path().join("aqi_data.csv"));
        store
            .append(&Reading::new("2015-01-01", None, [None, Some(1.0), None, None, None, None, None, None]))
            .unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().nth(1), Some("2015-01-01,,,1.0,,,,,,"));
    }

    #[test]
    fn test_replace_all_overwrites_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::new(dir.path().join("aqi_data.csv"));
        store.append(&reading("old", Some(1.0))).unwrap();

        let rows = vec![reading("2015-01-01", Some(120.0)), reading("2015-01-02", None)];
        assert_eq!(store.replace_all(&rows).unwrap(), 2);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.readings, rows);
        assert!(loaded.synthesized.is_empty());
        assert!(!dir.path().join("aqi_data.csv.tmp").exists(), "temp file is renamed away");
    }

    #[test]
    fn test_load_missing_file_is_missing_prerequisite() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::new(dir.path().join("absent.csv"));
        assert!(matches!(store.load(), Err(PipelineError::MissingPrerequisite { .. })));
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn test_load_empty_file_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aqi_data.csv");

        fs::write(&path, "").unwrap();
        assert!(matches!(ReadingStore::new(&path).load(), Err(PipelineError::EmptyDataset(_))));

        fs::write(&path, format!("{}\n", HEADER)).unwrap();
        assert!(matches!(ReadingStore::new(&path).load(), Err(PipelineError::EmptyDataset(_))));
    }

    #[test]
    fn test_reconcile_synthesizes_absent_columns() {
        let headers: Vec<String> = ["timestamp", "aqi", "co", "no", "no2", "o3", "so2", "pm2_5", "pm10", "extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = vec![csv::StringRecord::from(vec![
            "t0", "42", "1", "2", "3", "4", "5", "6", "7", "ignored",
        ])];

        let loaded = reconcile(&headers, &records).unwrap();
        assert_eq!(loaded.synthesized, vec!["nh3".to_string()]);
        assert_eq!(loaded.readings[0].nh3, None);
        assert_eq!(loaded.readings[0].pm10, Some(7.0));
        assert_eq!(loaded.readings[0].aqi, Some(42.0));
    }

    #[test]
    fn test_reconcile_rejects_non_numeric_cells() {
        let headers: Vec<String> = COLUMNS.iter().map(|s| s.to_string()).collect();
        let records = vec![csv::StringRecord::from(vec![
            "t0", "42", "abc", "2", "3", "4", "5", "6", "7", "8",
        ])];
        let result = reconcile(&headers, &records);
        assert!(matches!(result, Err(PipelineError::ParseError(ref m)) if m.contains("'co'")), "got {:?}", result);
    }

    #[test]
    fn test_parse_cell_missing_markers() {
        assert_eq!(parse_cell("").unwrap(), None);
        assert_eq!(parse_cell("  ").unwrap(), None);
        assert_eq!(parse_cell("NaN").unwrap(), None);
        assert_eq!(parse_cell("nan").unwrap(), None);
        assert_eq!(parse_cell("NA").unwrap(), None);
        assert_eq!(parse_cell("12.5").unwrap(), Some(12.5));
        assert_eq!(parse_cell("x"), Err(CellError::NotANumber));
    }

    #[test]
    fn test_parse_cell_rejects_infinities() {
        assert_eq!(parse_cell("inf"), Err(CellError::NotFinite));
        assert_eq!(parse_cell("-inf"), Err(CellError::NotFinite));
        assert_eq!(parse_cell("Infinity"), Err(CellError::NotFinite));
        assert_eq!(parse_cell("1e400"), Err(CellError::NotFinite), "overflowing literals are infinite too");
    }

    #[test]
    fn test_load_rejects_infinite_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aqi_data.csv");
        fs::write(
            &path,
            format!("{}\na,10,inf,1,1,1,1,1,1,1\nb,90,-inf,1,1,1,1,1,1,1\n", HEADER),
        )
        .unwrap();

        let result = ReadingStore::new(&path).load();
        assert!(
            matches!(result, Err(PipelineError::ParseError(ref m)) if m.contains("'co'") && m.contains("finite")),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_uncommitted_staged_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("models").join("model.json");
        {
            let _staged = StagedFile::write(&dest, b"{}").unwrap();
            assert!(dir.path().join("models").join("model.json.tmp").exists());
        }
        assert!(!dir.path().join("models").join("model.json.tmp").exists());
        assert!(!dest.exists());
    }
}
