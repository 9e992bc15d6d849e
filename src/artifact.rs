//! The enhanced metrics artifact and its gzip container.

use std::{
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encode::DatasetBlock;

pub const DATA_VERSION: &str = "2.0";

pub const DEFAULT_OUTPUT: &str = "public/data/enhanced_metrics_detailed.json.gz";

/// Persisted value of `metadata.compressionRatio`; the real ratio is only known after
/// compression.
pub const COMPRESSION_RATIO_UNKNOWN: &str = "N/A";

const DESCRIPTION: &str =
    "Dictionary-encoded Medicaid rate metrics with derived recent rate changes";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialize artifact: {0}")]
    Serialize(serde_json::Error),
    #[error("parse artifact: {0}")]
    Parse(serde_json::Error),
    #[error("compress artifact: {0}")]
    Compress(std::io::Error),
    #[error("decompress artifact: {0}")]
    Decompress(std::io::Error),
    #[error("write {}: {error}", path.display())]
    Write {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("read {}: {error}", path.display())]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_provider_alerts: usize,
    pub total_legislative_updates: usize,
    pub total_service_categories: usize,
    pub total_master_data_records: usize,
    pub total_recent_rate_changes: usize,
    pub new_provider_alerts: usize,
    pub new_legislative_updates: usize,
    pub last_updated: String,
    pub data_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub generated_at: String,
    pub version: String,
    pub description: String,
    pub tables: Vec<String>,
    pub compression_ratio: String,
}

impl Metadata {
    pub fn new(generated_at: DateTime<Utc>, tables: Vec<String>) -> Self {
        Self {
            generated_at: timestamp(generated_at),
            version: DATA_VERSION.to_owned(),
            description: DESCRIPTION.to_owned(),
            tables,
            compression_ratio: COMPRESSION_RATIO_UNKNOWN.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedMetrics {
    pub provider_alerts: DatasetBlock,
    pub legislative_updates: DatasetBlock,
    pub service_categories: DatasetBlock,
    pub master_data: DatasetBlock,
    pub recent_rate_changes: DatasetBlock,
    pub summary: Summary,
    pub metadata: Metadata,
}

impl EnhancedMetrics {
    /// Blocks paired with their artifact keys, in artifact order.
    pub fn blocks(&self) -> [(&'static str, &DatasetBlock); 5] {
        [
            ("provider_alerts", &self.provider_alerts),
            ("legislative_updates", &self.legislative_updates),
            ("service_categories", &self.service_categories),
            ("master_data", &self.master_data),
            ("recent_rate_changes", &self.recent_rate_changes),
        ]
    }

    pub fn block(&self, key: &str) -> Option<&DatasetBlock> {
        self.blocks()
            .into_iter()
            .find_map(|(name, block)| (name == key).then_some(block))
    }
}

/// ISO 8601 UTC timestamp with millisecond precision.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Share of bytes saved by compression, e.g. `"87.3%"`.
pub fn compression_ratio(original: usize, compressed: usize) -> String {
    if original == 0 {
        return COMPRESSION_RATIO_UNKNOWN.to_owned();
    }
    format!(
        "{:.1}%",
        (1.0 - compressed as f64 / original as f64) * 100.0
    )
}

pub fn to_json(metrics: &EnhancedMetrics) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(metrics).map_err(Error::Serialize)
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).map_err(Error::Compress)?;
    encoder.finish().map_err(Error::Compress)
}

pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(Error::Decompress)?;
    Ok(out)
}

/// Replace the file at `path` with `bytes`.
///
/// The bytes go to a sibling temporary file first, so `path` never holds a partial artifact.
pub async fn write(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let write_error = |error| Error::Write {
        path: path.to_owned(),
        error,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    debug!(path = %staging.display(), size = bytes.len(), "write staging file");
    tokio::fs::write(&staging, bytes).await.map_err(write_error)?;
    if let Err(error) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(write_error(error));
    }
    Ok(())
}

/// Read and decode an artifact written by [`write`].
pub async fn read(path: &Path) -> Result<EnhancedMetrics, Error> {
    let bytes = tokio::fs::read(path).await.map_err(|error| Error::Read {
        path: path.to_owned(),
        error,
    })?;
    let json = blocking::unblock(move || gunzip(&bytes)).await?;
    serde_json::from_slice(&json).map_err(Error::Parse)
}
