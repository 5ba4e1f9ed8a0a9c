//! Append-only record logs.
//!
//! The scorer only needs two operations from its storage: read every record
//! and append one record. [`CsvLog`] backs them with a delimited text file
//! shared with other processes; [`MemoryLog`] keeps records in memory.

use crate::observation::{EngagementScoreSample, ObservationRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An ordered, append-only sequence of records.
pub trait AppendLog<R> {
    /// Read every record currently in the log, oldest first.
    fn read_all(&self) -> Result<Vec<R>, StoreError>;

    /// Append one record to the end of the log.
    fn append(&mut self, record: &R) -> Result<(), StoreError>;
}

/// A record type with a fixed CSV header.
pub trait CsvRecord: Serialize + DeserializeOwned {
    const HEADER: &'static [&'static str];
}

impl CsvRecord for ObservationRecord {
    const HEADER: &'static [&'static str] = &["timestamp", "emotion"];
}

impl CsvRecord for EngagementScoreSample {
    const HEADER: &'static [&'static str] = &["timestamp", "engagement_score"];
}

/// A CSV file with a header row, used as an append-only log.
///
/// A missing file reads as empty. Rows that fail to decode are skipped with
/// a warning so a single torn or hand-edited line never blocks a cycle.
#[derive(Debug, Clone)]
pub struct CsvLog<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: CsvRecord> CsvLog<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file (and its parent directory) with only a header row if
    /// it does not exist yet. Returns whether a file was created.
    pub fn ensure_exists(&self) -> Result<bool, StoreError> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;

        // Another writer may have created it between the check and the open.
        let len = file
            .metadata()
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();
        if len == 0 {
            file.write_all(&self.header_line()?)
                .map_err(|e| StoreError::io(&self.path, e))?;
        }

        Ok(true)
    }

    fn header_line(&self) -> Result<Vec<u8>, StoreError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(R::HEADER)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        writer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path, std::io::Error::other(e.to_string())))
    }

    fn record_line(&self, record: &R) -> Result<Vec<u8>, StoreError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(record)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        writer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path, std::io::Error::other(e.to_string())))
    }
}

impl<R: CsvRecord> AppendLog<R> for CsvLog<R> {
    fn read_all(&self) -> Result<Vec<R>, StoreError> {
        if !self.path.exists() {
            tracing::debug!(path = ?self.path, "log file not found, treating as empty");
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;

        // A row without its newline may still be mid-write by the producer.
        let complete = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(end) => &bytes[..=end],
            None => &bytes[..0],
        };
        if complete.len() < bytes.len() {
            tracing::debug!(
                path = ?self.path,
                torn_bytes = bytes.len() - complete.len(),
                "ignoring unterminated trailing row"
            );
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(complete);

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<R>() {
            match row {
                Ok(record) => records.push(record),
                Err(e) if e.is_io_error() => return Err(StoreError::csv(&self.path, e)),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(path = ?self.path, error = %e, "skipping undecodable row");
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(path = ?self.path, skipped, "skipped undecodable rows");
        }

        Ok(records)
    }

    fn append(&mut self, record: &R) -> Result<(), StoreError> {
        self.ensure_exists()?;

        // One write per row so concurrent readers see whole lines only.
        let line = self.record_line(record)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(&line)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.flush().map_err(|e| StoreError::io(&self.path, e))?;

        Ok(())
    }
}

/// In-memory log, for tests and for dry runs that must not touch disk.
#[derive(Debug, Clone)]
pub struct MemoryLog<R> {
    records: Vec<R>,
    fail_reads: bool,
    fail_appends: bool,
}

impl<R: Clone> MemoryLog<R> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            fail_reads: false,
            fail_appends: false,
        }
    }

    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            records,
            ..Self::new()
        }
    }

    /// Make subsequent reads fail, simulating an unreadable source.
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make subsequent appends fail, simulating an unwritable sink.
    pub fn set_fail_appends(&mut self, fail: bool) {
        self.fail_appends = fail;
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: Clone> Default for MemoryLog<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone> AppendLog<R> for MemoryLog<R> {
    fn read_all(&self) -> Result<Vec<R>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("memory log read disabled".into()));
        }
        Ok(self.records.clone())
    }

    fn append(&mut self, record: &R) -> Result<(), StoreError> {
        if self.fail_appends {
            return Err(StoreError::Unavailable("memory log append disabled".into()));
        }
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(secs: u32, score: f64) -> EngagementScoreSample {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, secs)
            .unwrap();
        EngagementScoreSample::new(ts, score)
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log: CsvLog<ObservationRecord> = CsvLog::new(dir.path().join("emotions.csv"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engagement.csv");
        let mut log: CsvLog<EngagementScoreSample> = CsvLog::new(&path);

        log.append(&sample(0, 25.0)).unwrap();
        log.append(&sample(30, 50.0)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "timestamp,engagement_score\n2024-03-04 10:00:00,25.0\n2024-03-04 10:00:30,50.0\n"
        );

        let samples = log.read_all().unwrap();
        assert_eq!(samples, vec![sample(0, 25.0), sample(30, 50.0)]);
    }

    #[test]
    fn test_ensure_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotions.csv");
        let log: CsvLog<ObservationRecord> = CsvLog::new(&path);

        assert!(log.ensure_exists().unwrap());
        assert!(!log.ensure_exists().unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "timestamp,emotion\n");
    }

    #[test]
    fn test_undecodable_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotions.csv");
        std::fs::write(
            &path,
            "timestamp,emotion\n2024-03-04 10:00:00,happy\n2024-03-04 10:00:01\n2024-03-04 10:00:02,sad\n",
        )
        .unwrap();

        let log: CsvLog<ObservationRecord> = CsvLog::new(&path);
        let records = log.read_all().unwrap();
        assert_eq!(
            records,
            vec![
                ObservationRecord::new("2024-03-04 10:00:00", "happy"),
                ObservationRecord::new("2024-03-04 10:00:02", "sad"),
            ]
        );
    }

    #[test]
    fn test_unterminated_trailing_row_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotions.csv");
        std::fs::write(
            &path,
            "timestamp,emotion\n2024-03-04 10:00:00,happy\n2024-03-04 10:00:01,ha",
        )
        .unwrap();

        let log: CsvLog<ObservationRecord> = CsvLog::new(&path);
        assert_eq!(
            log.read_all().unwrap(),
            vec![ObservationRecord::new("2024-03-04 10:00:00", "happy")]
        );

        // Once the producer finishes the line it is read normally.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"ppy\n").unwrap();
        assert_eq!(log.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_header_only_without_newline_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotions.csv");
        std::fs::write(&path, "timestamp,emotion").unwrap();

        let log: CsvLog<ObservationRecord> = CsvLog::new(&path);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_memory_log_failures() {
        let mut log = MemoryLog::with_records(vec![1, 2]);
        assert_eq!(log.read_all().unwrap(), vec![1, 2]);

        log.set_fail_reads(true);
        assert!(log.read_all().is_err());

        log.set_fail_appends(true);
        assert!(log.append(&3).is_err());
        assert_eq!(log.len(), 2);
    }
}
