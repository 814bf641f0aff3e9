//! Upscale history log.
//!
//! Each successful upscale can be appended to a JSON-lines file, one record
//! per line:
//!
//! ```json
//! {"id":"3f0c…","source":"photo.jpg","source_sha256":"9b1e…","original":{"width":800,"height":600},"upscaled":{"width":1600,"height":1200},"factor":2,"origin":"resized","timestamp":1760000000}
//! ```
//!
//! Sources are identified by the SHA-256 of their contents, so the same
//! image uploaded under different names is recognisable.
//!
//! Recording is fire-and-forget: [`HistoryLog::record_detached`] hashes and
//! writes on its own thread, and a failure there is only logged. It never
//! changes the outcome already handed to the caller.

use crate::imaging::Dimensions;
use crate::types::{Origin, UpscaleOutcome, UpscaleRequest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One line of the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    /// Source file name, without its directory.
    pub source: String,
    pub source_sha256: String,
    pub original: Dimensions,
    pub upscaled: Dimensions,
    pub factor: u32,
    pub origin: Origin,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl HistoryRecord {
    pub fn new(
        request: &UpscaleRequest,
        upscaled: Dimensions,
        origin: Origin,
        source_sha256: String,
        timestamp: u64,
    ) -> Self {
        let id = record_id(&source_sha256, request.factor.get(), timestamp);
        Self {
            id,
            source: request.file_name(),
            source_sha256,
            original: request.original,
            upscaled,
            factor: request.factor.get(),
            origin,
            timestamp,
        }
    }

    /// Hash the source file and stamp the record with the current time.
    pub fn capture(
        request: &UpscaleRequest,
        upscaled: Dimensions,
        origin: Origin,
    ) -> Result<Self, HistoryError> {
        let digest = hash_file(&request.source)?;
        Ok(Self::new(request, upscaled, origin, digest, unix_now()))
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Short record id derived from the source digest, factor and time.
fn record_id(source_sha256: &str, factor: u32, timestamp: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_sha256.as_bytes());
    hasher.update(b"\0");
    hasher.update(factor.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Append-only JSON-lines history file.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and its parent directory if needed.
    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // One write per record keeps concurrent appends line-atomic.
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read every record. A missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(HistoryError::from))
            .collect()
    }

    /// Record an outcome on a background thread. Failures are logged, never
    /// returned. The handle may be joined or dropped.
    pub fn record_detached(
        &self,
        request: &UpscaleRequest,
        outcome: &UpscaleOutcome,
    ) -> JoinHandle<()> {
        let log = self.clone();
        let request = request.clone();
        let upscaled = outcome.dimensions();
        let origin = outcome.origin;
        thread::spawn(move || {
            let result = HistoryRecord::capture(&request, upscaled, origin)
                .and_then(|record| log.append(&record).map(|()| record));
            match result {
                Ok(record) => {
                    debug!(id = %record.id, path = %log.path.display(), "history recorded")
                }
                Err(err) => warn!(
                    source = %request.source.display(),
                    error = %err,
                    "failed to record upscale history"
                ),
            }
        })
    }
}
