//! Remote enhancement provider client.
//!
//! Sends the source image to the provider as a multipart `POST`:
//!
//! | Field | Content |
//! |---|---|
//! | `image_file` | raw source bytes, with file name and media type |
//! | `target_width` | planned output width |
//! | `target_height` | planned output height |
//!
//! authenticated with an `x-api-key` header. A 2xx body is the enhanced image,
//! returned verbatim.
//!
//! ## Fallback
//!
//! If the primary endpoint answers 404 and a fallback endpoint is configured,
//! the identical payload is sent to the fallback exactly once and its result
//! is final. Every other failure (other statuses, network errors) propagates
//! immediately. There are no other retries.
//!
//! ## Deadlines and cancellation
//!
//! Each call takes [`CallOptions`]. A triggered cancellation token or an
//! expired deadline stops the call before the next attempt is sent; the time
//! left until the deadline bounds the HTTP request itself.

use crate::encode::MediaType;
use crate::imaging::Dimensions;
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Header carrying the provider credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Cancellation token shared between a caller and an in-flight call.
pub type CancellationToken = Arc<AtomicBool>;

/// Checks if the cancellation token has been triggered.
#[inline]
pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(Ordering::SeqCst)
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("upscale provider error {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("upscale provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upscale provider call cancelled")]
    Cancelled,
    #[error("upscale provider deadline exceeded")]
    DeadlineExceeded,
    #[error("no upscale provider credential configured")]
    MissingCredential,
}

impl ProviderError {
    /// HTTP status of a rejected call, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Provider API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key exactly as given; all-blank keys count as "not configured".
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        (!key.trim().is_empty()).then_some(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Process-wide provider settings, built once at startup and passed in.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub credential: Option<Credential>,
    pub primary_endpoint: String,
    pub fallback_endpoint: Option<String>,
    pub max_dimension: u32,
    pub request_timeout: Duration,
}

/// Per-call limits supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub cancel: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl CallOptions {
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Give up once `budget` has elapsed from now.
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    /// Fail if cancelled or out of time; otherwise return the time left, if bounded.
    fn remaining(&self) -> Result<Option<Duration>, ProviderError> {
        if self.cancel.as_ref().is_some_and(is_cancelled) {
            return Err(ProviderError::Cancelled);
        }
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    Err(ProviderError::DeadlineExceeded)
                } else {
                    Ok(Some(left))
                }
            }
        }
    }
}

/// Everything the provider needs for one enhancement.
#[derive(Debug, Clone)]
pub struct EnhanceJob {
    pub image: Vec<u8>,
    pub file_name: String,
    pub media_type: MediaType,
    pub target: Dimensions,
}

/// Something that turns a source image into an enhanced one.
pub trait Enhancer: Send + Sync {
    fn enhance(&self, job: &EnhanceJob, call: &CallOptions) -> Result<Vec<u8>, ProviderError>;
}

/// HTTP client for the enhancement provider.
pub struct ProviderClient {
    http: Client,
    credential: Credential,
    primary: String,
    fallback: Option<String>,
    request_timeout: Duration,
}

impl ProviderClient {
    /// Build a client. Fails with [`ProviderError::MissingCredential`] when
    /// the config carries no key.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let credential = config
            .credential
            .clone()
            .ok_or(ProviderError::MissingCredential)?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            credential,
            primary: config.primary_endpoint.clone(),
            fallback: config.fallback_endpoint.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn attempt(
        &self,
        endpoint: &str,
        job: &EnhanceJob,
        call: &CallOptions,
    ) -> Result<Vec<u8>, ProviderError> {
        let remaining = call.remaining()?;

        let image = Part::bytes(job.image.clone())
            .file_name(job.file_name.clone())
            .mime_str(job.media_type.as_str())?;
        let form = Form::new()
            .part("image_file", image)
            .text("target_width", job.target.width.to_string())
            .text("target_height", job.target.height.to_string());

        let mut request = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, self.credential.expose())
            .multipart(form);
        // A per-request timeout replaces the client's, so never exceed it.
        if let Some(left) = remaining {
            request = request.timeout(left.min(self.request_timeout));
        }

        debug!(endpoint, target = %job.target, "sending enhancement request");
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl Enhancer for ProviderClient {
    fn enhance(&self, job: &EnhanceJob, call: &CallOptions) -> Result<Vec<u8>, ProviderError> {
        match self.attempt(&self.primary, job, call) {
            Err(err) if err.status() == Some(404) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        primary = %self.primary,
                        fallback = %fallback,
                        "primary endpoint returned 404, retrying fallback once"
                    );
                    self.attempt(fallback, job, call)
                }
                None => Err(err),
            },
            result => result,
        }
    }
}
