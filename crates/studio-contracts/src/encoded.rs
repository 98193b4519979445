use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed reading {path}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid file format")]
    MalformedDataUrl,
    #[error("image payload is not valid base64: {0}")]
    InvalidPayload(String),
}

/// An uploaded or generated image carried as base64 text.
///
/// Values are never mutated after construction; a new selection replaces the
/// whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    payload: String,
    media_type: String,
    name: String,
}

impl EncodedImage {
    pub fn from_bytes(
        bytes: &[u8],
        media_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            payload: BASE64.encode(bytes),
            media_type: normalize_media_type(media_type.into()),
            name: name.into(),
        }
    }

    pub fn from_base64(
        payload: impl Into<String>,
        media_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, DecodeError> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(DecodeError::InvalidPayload("empty payload".to_string()));
        }
        BASE64
            .decode(payload.as_bytes())
            .map_err(|err| DecodeError::InvalidPayload(err.to_string()))?;
        Ok(Self {
            payload,
            media_type: normalize_media_type(media_type.into()),
            name: name.into(),
        })
    }

    /// Parses `data:<media type>;base64,<payload>`.
    ///
    /// A header without a recoverable media type falls back to
    /// [`FALLBACK_MEDIA_TYPE`]; a string that does not split into a header and
    /// a non-empty payload is rejected.
    pub fn from_data_url(url: &str, name: impl Into<String>) -> Result<Self, DecodeError> {
        let (header, data) = url.split_once(',').ok_or(DecodeError::MalformedDataUrl)?;
        if header.is_empty() || data.is_empty() {
            return Err(DecodeError::MalformedDataUrl);
        }
        let media_type = header
            .split_once(':')
            .and_then(|(_, rest)| rest.split_once(';'))
            .map(|(mime, _)| mime.trim())
            .filter(|mime| !mime.is_empty())
            .unwrap_or(FALLBACK_MEDIA_TYPE);
        Self::from_base64(data, media_type, name)
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.payload)
    }

    pub fn decode(&self) -> Result<Vec<u8>, DecodeError> {
        BASE64
            .decode(self.payload.as_bytes())
            .map_err(|err| DecodeError::InvalidPayload(err.to_string()))
    }
}

fn normalize_media_type(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        FALLBACK_MEDIA_TYPE.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    ::image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{media_type_for_path, sniff_media_type, DecodeError, EncodedImage};

    #[test]
    fn data_url_round_trips_through_parts() -> anyhow::Result<()> {
        let image = EncodedImage::from_data_url("data:image/png;base64,aGVsbG8=", "cat.png")?;
        assert_eq!(image.media_type(), "image/png");
        assert_eq!(image.payload(), "aGVsbG8=");
        assert_eq!(image.name(), "cat.png");
        assert_eq!(image.data_url(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(image.decode()?, b"hello");
        Ok(())
    }

    #[test]
    fn data_url_without_media_type_uses_fallback() -> anyhow::Result<()> {
        let image = EncodedImage::from_data_url("data:;base64,aGVsbG8=", "blob")?;
        assert_eq!(image.media_type(), "application/octet-stream");

        let bare = EncodedImage::from_data_url("garbage-header,aGVsbG8=", "blob")?;
        assert_eq!(bare.media_type(), "application/octet-stream");
        Ok(())
    }

    #[test]
    fn data_url_without_payload_is_rejected() {
        assert!(matches!(
            EncodedImage::from_data_url("data:image/png;base64,", "x"),
            Err(DecodeError::MalformedDataUrl)
        ));
        assert!(matches!(
            EncodedImage::from_data_url("no comma here", "x"),
            Err(DecodeError::MalformedDataUrl)
        ));
    }

    #[test]
    fn invalid_base64_payload_is_rejected() {
        assert!(matches!(
            EncodedImage::from_base64("%%%not base64%%%", "image/png", "x"),
            Err(DecodeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn media_type_inference_prefers_extension_then_content() {
        assert_eq!(media_type_for_path(Path::new("a/B.JPG")), Some("image/jpeg"));
        assert_eq!(media_type_for_path(Path::new("a/b.webp")), Some("image/webp"));
        assert_eq!(media_type_for_path(Path::new("a/b")), None);

        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_media_type(&png_magic), Some("image/png"));
        assert_eq!(sniff_media_type(b"plain text"), None);
    }
}
