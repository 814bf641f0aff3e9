//! Writing results to disk for CLI runs.
//!
//! Each outcome becomes a pretty-printed JSON report in the output
//! directory, optionally with the decoded image beside it. File names come
//! from [`crate::naming`].

use crate::encode::EncodeError;
use crate::naming;
use crate::types::{UpscaleOutcome, UpscaleReport, UpscaleRequest};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not decode payload: {0}")]
    Decode(#[from] EncodeError),
}

/// Write the JSON report (and with `save_image`, the image) for one outcome.
/// Returns the written paths, report first.
pub fn save_outcome(
    out_dir: &Path,
    save_image: bool,
    request: &UpscaleRequest,
    outcome: &UpscaleOutcome,
) -> Result<Vec<PathBuf>, SaveError> {
    let mut written = Vec::new();

    let report = UpscaleReport::new(request, outcome);
    let report_path = out_dir.join(naming::report_file_name(&request.source, request.factor));
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    written.push(report_path);

    if save_image {
        let bytes = outcome.payload.decode()?;
        let image_path = out_dir.join(naming::image_file_name(
            &request.source,
            request.factor,
            outcome.payload.media_type(),
        ));
        fs::write(&image_path, bytes)?;
        written.push(image_path);
    }

    Ok(written)
}
