//! Result encoding: bytes → self-describing `data:` URL.
//!
//! The payload handed back to callers is a base64 data URL tagged with the
//! media type of the original upload, so a browser can render or download it
//! without another request.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("refusing to encode an empty payload")]
    Empty,
    #[error("malformed data URL: {0}")]
    Malformed(String),
}

/// Media types the pipeline can tag a payload with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    WebP,
    #[serde(rename = "application/octet-stream")]
    OctetStream,
}

impl MediaType {
    /// Map a file extension (with or without the leading dot, any case).
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::WebP,
            _ => Self::OctetStream,
        }
    }

    /// Media type of a file path. A path with no extension is treated as PNG,
    /// matching how uploads without an extension are stored.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Png, Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Preferred file extension when writing a payload back to disk.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::OctetStream => "bin",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media-type-tagged inline payload (`data:<type>;base64,<bytes>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPayload {
    media_type: MediaType,
    data_url: String,
}

impl EncodedPayload {
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    pub fn into_data_url(self) -> String {
        self.data_url
    }

    /// Decode the payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, EncodeError> {
        decode_data_url(&self.data_url).map(|(_, bytes)| bytes)
    }
}

/// Wrap `bytes` into a data URL tagged with `media_type`.
pub fn encode_payload(bytes: &[u8], media_type: MediaType) -> Result<EncodedPayload, EncodeError> {
    if bytes.is_empty() {
        return Err(EncodeError::Empty);
    }
    Ok(EncodedPayload {
        media_type,
        data_url: format!("data:{};base64,{}", media_type, BASE64.encode(bytes)),
    })
}

/// Split a base64 data URL into its media type string and decoded bytes.
pub fn decode_data_url(url: &str) -> Result<(&str, Vec<u8>), EncodeError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| EncodeError::Malformed("missing data: prefix".into()))?;
    let (media, data) = rest
        .split_once(";base64,")
        .ok_or_else(|| EncodeError::Malformed("missing ;base64, separator".into()))?;
    let bytes = BASE64
        .decode(data)
        .map_err(|e| EncodeError::Malformed(e.to_string()))?;
    Ok((media, bytes))
}
