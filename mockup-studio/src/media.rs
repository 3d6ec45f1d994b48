// Inline image values exchanged with the generation API.
//
// Images travel as base64 payloads tagged with a MIME type, the same shape the
// API uses for `inlineData` parts. Helpers convert to and from files and
// `data:` URLs.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// MIME types accepted for user-supplied images.
pub const ACCEPTED_INPUT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported image type for {path}: {mime} (expected PNG, JPEG or WEBP)")]
    UnsupportedType { path: PathBuf, mime: String },

    #[error("malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("invalid base64 image payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// A base64-encoded image with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    /// Standard (padded) base64, no `data:` prefix.
    pub data: String,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encode raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, BASE64.encode(bytes))
    }

    /// Load an input image from disk. The MIME type comes from the file
    /// extension and must be one of [`ACCEPTED_INPUT_TYPES`].
    pub fn from_path(path: &Path) -> Result<Self, MediaError> {
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !ACCEPTED_INPUT_TYPES.contains(&mime.as_str()) {
            return Err(MediaError::UnsupportedType {
                path: path.to_path_buf(),
                mime,
            });
        }

        let bytes = std::fs::read(path).map_err(|source| MediaError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_bytes(mime, &bytes))
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, MediaError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| MediaError::MalformedDataUrl("missing `data:` prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| MediaError::MalformedDataUrl("missing `,` separator".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| MediaError::MalformedDataUrl("only base64 data URLs are supported".into()))?;
        if mime.is_empty() {
            return Err(MediaError::MalformedDataUrl("empty MIME type".into()));
        }
        Ok(Self::new(mime, payload))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decode the payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, MediaError> {
        Ok(BASE64.decode(self.data.as_bytes())?)
    }

    /// True when the model returned an animation rather than a still.
    pub fn is_animated(&self) -> bool {
        self.mime_type == "image/gif"
    }

    /// File extension used when saving this image.
    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}
