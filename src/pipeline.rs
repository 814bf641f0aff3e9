//! Upscale orchestration.
//!
//! Composes the dimension planner, the enhancement provider, the local
//! resizer, the mock assets and the result encoder into one call:
//!
//! ```text
//! latency pause → plan → render → encode → UpscaleOutcome
//! ```
//!
//! ## Strategies
//!
//! How failures are treated depends on whether a provider credential was
//! configured, and that is decided once, when the [`Upscaler`] is built:
//!
//! | Mode | Render step | On failure |
//! |---|---|---|
//! | [`Mode::Enhanced`] | provider call (with its 404 fallback) | error returned to the caller |
//! | [`Mode::Degraded`] | local stretch-fit resize | warning logged, mock asset substituted |
//!
//! Invalid dimensions and encoding failures are fatal in both modes.
//!
//! ## Concurrency
//!
//! An `Upscaler` holds no per-request state and is `Send + Sync`; requests
//! work entirely in memory. [`Upscaler::upscale_all`] runs a batch on the
//! rayon pool and returns results in input order.

use crate::config::UpscaleConfig;
use crate::encode::{EncodeError, MediaType, encode_payload};
use crate::imaging::{
    BackendError, ImageBackend, InvalidDimensions, Quality, ResizeParams, RustBackend,
    UpscalePlan, plan_upscale,
};
use crate::mock::MockResolver;
use crate::provider::{
    CallOptions, EnhanceJob, Enhancer, ProviderClient, ProviderConfig, ProviderError,
};
use crate::types::{Origin, UpscaleOutcome, UpscaleRequest};
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum UpscaleError {
    #[error("{0}")]
    InvalidDimensions(#[from] InvalidDimensions),
    #[error("upscale provider call failed: {0}")]
    ProviderCallFailed(#[from] ProviderError),
    #[error("local resize failed: {0}")]
    LocalResizeFailed(#[from] BackendError),
    #[error("could not encode result: {0}")]
    EncodingFailed(#[from] EncodeError),
    #[error("cannot read source image {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl UpscaleError {
    /// Short message safe to show an end user. Details stay in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            UpscaleError::InvalidDimensions(_) => "The image has invalid dimensions.",
            UpscaleError::ProviderCallFailed(_) => {
                "The upscaling service could not process the image."
            }
            UpscaleError::LocalResizeFailed(_) => "The image could not be resized.",
            UpscaleError::EncodingFailed(_) => "The upscaled image could not be prepared.",
            UpscaleError::SourceUnreadable { .. } => "The uploaded image could not be read.",
        }
    }
}

/// Operating mode, fixed when the [`Upscaler`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Provider credential present: provider errors are reported.
    Enhanced,
    /// No credential: local resize, masked by mock assets.
    Degraded,
}

/// Bytes produced by a strategy, before encoding.
struct Rendered {
    bytes: Vec<u8>,
    media_type: MediaType,
    origin: Origin,
}

struct EnhancedStrategy {
    provider: Box<dyn Enhancer>,
}

impl EnhancedStrategy {
    fn render(
        &self,
        request: &UpscaleRequest,
        plan: &UpscalePlan,
        call: &CallOptions,
    ) -> Result<Rendered, UpscaleError> {
        let image = fs::read(&request.source).map_err(|source| UpscaleError::SourceUnreadable {
            path: request.source.clone(),
            source,
        })?;
        let media_type = MediaType::from_path(&request.source);
        let job = EnhanceJob {
            image,
            file_name: request.file_name(),
            media_type,
            target: plan.target,
        };

        let bytes = self.provider.enhance(&job, call).map_err(|err| {
            error!(
                source = %request.source.display(),
                status = ?err.status(),
                error = %err,
                "enhancement failed"
            );
            UpscaleError::ProviderCallFailed(err)
        })?;
        Ok(Rendered {
            bytes,
            media_type,
            origin: Origin::Enhanced,
        })
    }
}

struct DegradedStrategy {
    backend: Box<dyn ImageBackend>,
    mocks: MockResolver,
    quality: Quality,
}

impl DegradedStrategy {
    /// Never fails: a resize error falls through to the mock asset.
    fn render(&self, request: &UpscaleRequest, plan: &UpscalePlan) -> Rendered {
        let params = ResizeParams {
            source: request.source.clone(),
            width: plan.target.width,
            height: plan.target.height,
            quality: self.quality,
        };
        match self.backend.resize(&params) {
            Ok(bytes) => Rendered {
                bytes,
                media_type: MediaType::from_path(&request.source),
                origin: Origin::Resized,
            },
            Err(err) => {
                let failure = UpscaleError::LocalResizeFailed(err);
                let asset = self.mocks.resolve(request.factor.get());
                warn!(
                    source = %request.source.display(),
                    error = %failure,
                    mock = asset.name,
                    "local resize failed, using mock asset"
                );
                // Tagged like the source so every outcome maps from its extension.
                Rendered {
                    bytes: asset.bytes.to_vec(),
                    media_type: MediaType::from_path(&request.source),
                    origin: Origin::Mock,
                }
            }
        }
    }
}

enum Strategy {
    Enhanced(EnhancedStrategy),
    Degraded(DegradedStrategy),
}

/// The upscale orchestrator.
pub struct Upscaler {
    strategy: Strategy,
    max_dimension: u32,
    latency: Duration,
}

impl Upscaler {
    /// Provider-backed upscaler. Errors from `provider` are returned to callers.
    pub fn enhanced(provider: Box<dyn Enhancer>, max_dimension: u32) -> Self {
        Self {
            strategy: Strategy::Enhanced(EnhancedStrategy { provider }),
            max_dimension,
            latency: Duration::ZERO,
        }
    }

    /// Local upscaler. Resize failures are masked with the built-in mock assets.
    pub fn degraded(backend: Box<dyn ImageBackend>, quality: Quality, max_dimension: u32) -> Self {
        Self {
            strategy: Strategy::Degraded(DegradedStrategy {
                backend,
                mocks: MockResolver::builtin(),
                quality,
            }),
            max_dimension,
            latency: Duration::ZERO,
        }
    }

    /// Build from configuration. The mode follows `provider.credential`.
    pub fn from_config(
        config: &UpscaleConfig,
        provider: &ProviderConfig,
    ) -> Result<Self, UpscaleError> {
        let upscaler = if provider.credential.is_some() {
            let client = ProviderClient::new(provider)?;
            Self::enhanced(Box::new(client), provider.max_dimension)
        } else {
            warn!("no upscale provider credential configured, running in degraded mode");
            Self::degraded(
                Box::new(RustBackend::new()),
                Quality::new(config.pipeline.jpeg_quality),
                provider.max_dimension,
            )
        };
        Ok(upscaler.with_latency(config.pipeline.latency()))
    }

    /// Pause applied before every request. Zero disables it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn mode(&self) -> Mode {
        match self.strategy {
            Strategy::Enhanced(_) => Mode::Enhanced,
            Strategy::Degraded(_) => Mode::Degraded,
        }
    }

    /// Run one request through the pipeline.
    pub fn upscale(
        &self,
        request: &UpscaleRequest,
        call: &CallOptions,
    ) -> Result<UpscaleOutcome, UpscaleError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        let plan = plan_upscale(request.original, request.factor.get(), self.max_dimension)?;
        debug!(
            source = %request.source.display(),
            factor = %request.factor,
            original = %request.original,
            target = %plan.target,
            capped = plan.capped,
            "planned upscale"
        );

        let rendered = match &self.strategy {
            Strategy::Enhanced(strategy) => strategy.render(request, &plan, call)?,
            Strategy::Degraded(strategy) => strategy.render(request, &plan),
        };
        let payload = encode_payload(&rendered.bytes, rendered.media_type)?;

        Ok(UpscaleOutcome {
            payload,
            width: plan.target.width,
            height: plan.target.height,
            origin: rendered.origin,
        })
    }

    /// Run independent requests in parallel. Results keep input order.
    pub fn upscale_all(
        &self,
        requests: &[UpscaleRequest],
        call: &CallOptions,
    ) -> Vec<Result<UpscaleOutcome, UpscaleError>> {
        requests
            .par_iter()
            .map(|request| self.upscale(request, call))
            .collect()
    }
}
