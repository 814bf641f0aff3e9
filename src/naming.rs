//! Output file naming for CLI runs.
//!
//! Every output is named after its input's stem, the factor and a short tag
//! hashed from the input's full path. Inputs that share a stem but live in
//! different directories, or differ only by extension, get different names:
//!
//! - `photos/dawn.jpg` at 2x → `dawn-upscaled-2x-<tag>.json` (report)
//! - `photos/dawn.jpg` at 2x → `dawn-upscaled-2x-<tag>.jpg` (image)
//! - `archive/dawn.png` at 2x → `dawn-upscaled-2x-<other tag>.json`
//!
//! The tag is the first 8 hex digits of the SHA-256 of the path as given.
//! Output always lands in the chosen output directory, never next to the
//! source.

use crate::encode::MediaType;
use crate::types::Factor;
use sha2::{Digest, Sha256};
use std::path::Path;

const SOURCE_TAG_LEN: usize = 8;

/// File stem of `source`, or `image` when it has none.
pub fn output_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// Short hex tag identifying `source` by its full path.
pub fn source_tag(source: &Path) -> String {
    let digest = Sha256::digest(source.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..SOURCE_TAG_LEN].to_string()
}

fn base_name(source: &Path, factor: Factor) -> String {
    format!(
        "{}-upscaled-{}x-{}",
        output_stem(source),
        factor.get(),
        source_tag(source)
    )
}

/// `<stem>-upscaled-<N>x-<tag>.json`
pub fn report_file_name(source: &Path, factor: Factor) -> String {
    format!("{}.json", base_name(source, factor))
}

/// `<stem>-upscaled-<N>x-<tag>.<ext>`, with the extension of the payload's
/// media type.
pub fn image_file_name(source: &Path, factor: Factor, media_type: MediaType) -> String {
    format!("{}.{}", base_name(source, factor), media_type.extension())
}
