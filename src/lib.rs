//! # Magnify
//!
//! Image upscaling with a remote enhancement provider and a graceful local
//! fallback. Give it a stored, measured image and a factor; get back an
//! inline `data:` URL of the upscaled image plus its dimensions.
//!
//! # Architecture: One Request, One Pass
//!
//! Every request goes through the same short pipeline:
//!
//! ```text
//! 1. Pause     fixed latency, so both modes feel alike
//! 2. Plan      original × factor, capped to the provider limit
//! 3. Render    provider enhancement  |  local resize → mock asset
//! 4. Encode    bytes → data:<media type>;base64,…
//! ```
//!
//! Requests are independent and work in memory, so batches run in parallel
//! without sharing anything but the [`pipeline::Upscaler`] itself.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | The orchestrator: strategy selection, plan → render → encode, batches |
//! | [`provider`] | HTTP client for the enhancement provider, with its one-shot 404 fallback |
//! | [`imaging`] | Dimension planning plus pure-Rust identify and stretch-fit resize |
//! | [`mock`] | Built-in placeholder assets used when a local resize fails |
//! | [`encode`] | Media-type detection and data URL encoding |
//! | [`config`] | Layered `config.toml` loading, validation and the stock config |
//! | [`types`] | Requests, factors, outcomes and the JSON report |
//! | [`history`] | Fire-and-forget JSON-lines log of completed upscales |
//! | [`naming`] | Output file names for CLI runs |
//! | [`save`] | Writes reports and images for CLI runs |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Two Strategies, Chosen Once
//!
//! Whether a provider key is configured decides how failures behave, and that
//! decision is made when the [`pipeline::Upscaler`] is built, not per request:
//!
//! - **Enhanced**: the provider does the work and its errors reach the caller.
//!   Masking a paid, configured service behind a placeholder would hide outages.
//! - **Degraded**: no key, so the image is resized locally. If even that
//!   fails, a built-in mock asset is returned. Users always get an image.
//!
//! ## Configuration Is Injected
//!
//! The provider key is read from the environment exactly once, at startup,
//! and passed in through [`provider::ProviderConfig`]. Nothing below `main`
//! reads the environment, so tests build any configuration they need directly.
//!
//! ## Capped, Never Shrunk
//!
//! The provider accepts at most 4096px on either edge. The planner lowers the
//! scale until both edges fit, but never below 1: an original that is already
//! larger than the limit keeps its own size. See [`imaging::plan_upscale`].
//!
//! ## Pure-Rust Imaging
//!
//! Identify and resize use the `image` crate with Lanczos3 resampling. No
//! system libraries, no subprocesses.

pub mod config;
pub mod encode;
pub mod history;
pub mod imaging;
pub mod mock;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod save;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
