//! Bulk loading of metric records from delimited text files.
//!
//! Expected header:
//! `date,channel,country,os,impressions,clicks,installs,spend,revenue`.
//! The `os` column may be omitted, in which case records default to android.

use std::{io::Read, path::Path};

use thiserror::Error;
use validator::Validate;

use super::{MetricService, MetricServiceError};
use crate::models::CreateMetric;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Line {line}: {source}")]
    Csv { line: u64, source: csv::Error },

    #[error("Line {line}: invalid record: {message}")]
    Invalid { line: u64, message: String },

    #[error("Invalid delimiter {0:?}: must be a single ASCII character")]
    Delimiter(String),

    #[error(transparent)]
    Service(#[from] MetricServiceError),
}

/// Parse a delimiter argument such as `","`, `";"` or `"\t"`.
pub fn parse_delimiter(value: &str) -> Result<u8, LoadError> {
    match value {
        "\\t" | "\t" => Ok(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Ok(v.as_bytes()[0]),
        v => Err(LoadError::Delimiter(v.to_string())),
    }
}

/// Read and validate every record. Fails on the first bad line.
pub fn read_metrics<R: Read>(reader: R, delimiter: u8) -> Result<Vec<CreateMetric>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv { line: 1, source })?
        .clone();

    let mut metrics = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            line: source.position().map_or(0, |p| p.line()),
            source,
        })?;
        let line = record.position().map_or(0, |p| p.line());

        let mut metric: CreateMetric = record
            .deserialize(Some(&headers))
            .map_err(|source| LoadError::Csv { line, source })?;
        metric.country = metric.country.to_ascii_uppercase();

        metric.validate().map_err(|e| LoadError::Invalid {
            line,
            message: e.to_string(),
        })?;
        metrics.push(metric);
    }

    Ok(metrics)
}

impl MetricService {
    /// Load a delimited file into the metrics table in one transaction.
    #[tracing::instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn load_file(
        &self,
        path: impl AsRef<Path>,
        delimiter: u8,
    ) -> Result<usize, LoadError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let metrics = read_metrics(file, delimiter)?;
        tracing::info!(records = metrics.len(), "Parsed metric records");

        let inserted = self.insert(metrics).await?;
        tracing::info!(inserted, "Loaded metric records");
        Ok(inserted)
    }
}
