//! Request and result types shared by the pipeline, the CLI and the history log.
//!
//! A request is built once by the upstream caller (which has already stored
//! and measured the upload) and never shared between invocations. The outcome
//! is handed over to the caller, who serves or persists it.

use crate::encode::EncodedPayload;
use crate::imaging::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported upscale factor {factor}; supported: {supported:?}")]
pub struct UnsupportedFactor {
    pub factor: u32,
    pub supported: Vec<u32>,
}

/// A validated magnification factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Factor(u32);

impl Factor {
    /// Accept `value` only if it is one of the `supported` factors.
    pub fn new(value: u32, supported: &[u32]) -> Result<Self, UnsupportedFactor> {
        if value > 0 && supported.contains(&value) {
            Ok(Self(value))
        } else {
            Err(UnsupportedFactor {
                factor: value,
                supported: supported.to_vec(),
            })
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// One upscale invocation: a stored, already-measured source image and the
/// requested factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleRequest {
    pub source: PathBuf,
    pub factor: Factor,
    pub original: Dimensions,
}

impl UpscaleRequest {
    pub fn new(source: impl Into<PathBuf>, factor: Factor, original: Dimensions) -> Self {
        Self {
            source: source.into(),
            factor,
            original,
        }
    }

    /// File name sent to the provider and used for output names.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.png")
            .to_string()
    }
}

/// Which branch of the pipeline produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Remote provider enhancement.
    Enhanced,
    /// Local stretch-fit resize (no provider key configured).
    Resized,
    /// Built-in placeholder after the local resize failed.
    Mock,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Enhanced => "enhanced",
            Origin::Resized => "resized",
            Origin::Mock => "mock",
        })
    }
}

/// Final result of one upscale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleOutcome {
    pub payload: EncodedPayload,
    pub width: u32,
    pub height: u32,
    pub origin: Origin,
}

impl UpscaleOutcome {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }
}

/// JSON descriptor returned to callers for one upscale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpscaleReport {
    pub original_path: String,
    pub upscaled_url: String,
    pub original_width: u32,
    pub original_height: u32,
    pub upscaled_width: u32,
    pub upscaled_height: u32,
    pub upscale_factor: u32,
    pub origin: Origin,
}

impl UpscaleReport {
    pub fn new(request: &UpscaleRequest, outcome: &UpscaleOutcome) -> Self {
        Self {
            original_path: display_path(&request.source),
            upscaled_url: outcome.payload.as_data_url().to_string(),
            original_width: request.original.width,
            original_height: request.original.height,
            upscaled_width: outcome.width,
            upscaled_height: outcome.height,
            upscale_factor: request.factor.get(),
            origin: outcome.origin,
        }
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
