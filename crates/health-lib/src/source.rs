//! Training corpus sources
//!
//! The collector writes one CSV row per container sample with the columns
//! `timestamp, container_id, name, cpu_perc, mem_usage, mem_limit, mem_perc,
//! net_io, block_io, pids, label`. Only the five numeric columns and `label`
//! are consumed downstream; the rest are carried along untouched.

use crate::models::RawMetricRecord;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Trait for anything that can supply raw labeled records
pub trait RecordSource {
    /// Load every available record
    fn load(&self) -> Result<Vec<RawMetricRecord>>;

    /// Human-readable description used in logs
    fn describe(&self) -> String;
}

/// Records already held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<RawMetricRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<RawMetricRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for MemorySource {
    fn load(&self) -> Result<Vec<RawMetricRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }
}

/// Result of decoding a CSV stream
#[derive(Debug, Clone, Default)]
pub struct CsvLoad {
    pub records: Vec<RawMetricRecord>,
    /// Rows the CSV decoder could not read at all
    pub malformed_rows: usize,
}

/// Reads the collector's `docker_stats.csv`
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
}

impl CsvRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode records from any reader, skipping rows that fail to decode
    pub fn read_from<R: Read>(reader: R) -> Result<CsvLoad> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .context("Failed to read CSV headers")?
            .clone();
        debug!(columns = headers.len(), "CSV header read");

        let mut load = CsvLoad::default();
        for (idx, result) in rdr.deserialize::<RawMetricRecord>().enumerate() {
            match result {
                Ok(record) => load.records.push(record),
                Err(e) => {
                    load.malformed_rows += 1;
                    warn!(row = idx + 1, error = %e, "Skipping malformed CSV row");
                }
            }
        }
        Ok(load)
    }
}

impl RecordSource for CsvRecordSource {
    fn load(&self) -> Result<Vec<RawMetricRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open training data {:?}", self.path))?;
        let load = Self::read_from(file)
            .with_context(|| format!("Failed to read training data {:?}", self.path))?;

        info!(
            path = %self.path.display(),
            records = load.records.len(),
            malformed_rows = load.malformed_rows,
            "Loaded training records"
        );
        Ok(load.records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "timestamp,container_id,name,cpu_perc,mem_usage,mem_limit,mem_perc,net_io,block_io,pids,label";

    #[test]
    fn test_read_collector_csv() {
        let data = format!(
            "{}\n\
             2024-05-01T10:00:00,abc123,standard_container,0.05,3.1,7951,0.04,1.2kB / 0B,0B / 0B,1,working\n\
             2024-05-01T10:00:01,def456,failure_container,99.5,512,7951,6.44,1.2kB / 0B,0B / 0B,40,error\n",
            HEADER
        );
        let load = CsvRecordSource::read_from(data.as_bytes()).unwrap();
        assert_eq!(load.malformed_rows, 0);
        assert_eq!(load.records.len(), 2);

        let first = &load.records[0];
        assert_eq!(first.cpu_perc.as_deref(), Some("0.05"));
        assert_eq!(first.mem_limit.as_deref(), Some("7951"));
        assert_eq!(first.pids.as_deref(), Some("1"));
        assert_eq!(first.label.as_deref(), Some("working"));
        assert_eq!(first.net_io.as_deref(), Some("1.2kB / 0B"));
        assert_eq!(load.records[1].label.as_deref(), Some("error"));
    }

    #[test]
    fn test_empty_cells_and_missing_columns_are_absent() {
        let data = "cpu_perc,mem_usage,pids,label\n12%,,3,\n";
        let load = CsvRecordSource::read_from(data.as_bytes()).unwrap();
        let record = &load.records[0];
        assert_eq!(record.cpu_perc.as_deref(), Some("12%"));
        assert!(record.mem_usage.is_none());
        assert!(record.mem_limit.is_none());
        assert!(record.label.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, ",,c,10%,100MiB / 1000MiB,,10%,,,5,working").unwrap();
        file.flush().unwrap();

        let source = CsvRecordSource::new(file.path());
        let records = source.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mem_usage.as_deref(), Some("100MiB / 1000MiB"));
        assert!(source.describe().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = CsvRecordSource::new("/nonexistent/docker_stats.csv");
        assert!(source.load().is_err());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new(vec![RawMetricRecord::default(); 3]);
        assert_eq!(source.load().unwrap().len(), 3);
    }
}
