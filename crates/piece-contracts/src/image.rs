use std::fmt;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("failed reading {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An image carried as a self-describing string blob.
///
/// The blob is normally a data URL (`data:image/png;base64,<payload>`), which
/// is what a file picker hands over. A bare base64 payload is accepted too and
/// is treated as having no declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    blob: String,
}

impl EncodedImage {
    pub fn from_data_url(blob: impl Into<String>) -> Result<Self, ImageError> {
        let image = Self {
            blob: blob.into().trim().to_string(),
        };
        if image.payload().is_empty() {
            return Err(ImageError::EmptyPayload);
        }
        Ok(image)
    }

    pub fn from_bytes(bytes: &[u8], media_type: &str) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::EmptyPayload);
        }
        Ok(Self {
            blob: format!("data:{media_type};base64,{}", BASE64.encode(bytes)),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let bytes = fs::read(path).map_err(|source| ImageError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes, media_type_for_path(path))
    }

    /// The raw base64 payload with any `data:...,` header removed.
    pub fn payload(&self) -> &str {
        match self.blob.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, payload)| payload.trim())
                .unwrap_or_default(),
            None => self.blob.as_str(),
        }
    }

    pub fn declared_media_type(&self) -> Option<&str> {
        let rest = self.blob.strip_prefix("data:")?;
        let (header, _) = rest.split_once(',')?;
        header
            .split(';')
            .next()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Approximate size of the decoded image in bytes.
    pub fn decoded_len(&self) -> usize {
        let payload = self.payload();
        let padding = payload.bytes().rev().take_while(|byte| *byte == b'=').count();
        (payload.len() / 4 * 3).saturating_sub(padding)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("media_type", &self.declared_media_type())
            .field("payload_chars", &self.payload().len())
            .finish()
    }
}

pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}
