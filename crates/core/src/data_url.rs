//! Base64 `data:` URLs.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Errors parsing a `data:` URL.
#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("not a data URL")]
    MissingScheme,

    #[error("data URL has no payload separator")]
    MissingPayload,

    #[error("only base64 data URLs are supported")]
    NotBase64,

    #[error("invalid base64 payload")]
    Decode(#[from] base64::DecodeError),
}

/// A decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime: String,
    bytes: Vec<u8>,
}

impl DataUrl {
    /// Wrap raw bytes of type `mime`.
    #[must_use]
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Parse `data:<mime>;base64,<payload>`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is not a base64 data URL or the payload does not decode.
    pub fn parse(url: &str) -> Result<Self, DataUrlError> {
        let rest = url.strip_prefix(SCHEME).ok_or(DataUrlError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingPayload)?;
        let mime = header
            .strip_suffix(BASE64_MARKER)
            .ok_or(DataUrlError::NotBase64)?;

        Ok(Self {
            mime: mime.to_string(),
            bytes: BASE64.decode(payload.trim())?,
        })
    }

    /// Media type, e.g. `image/jpeg`.
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Decoded payload.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the decoded payload.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Render back into URL form.
    #[must_use]
    pub fn to_url(&self) -> String {
        encode(&self.mime, &self.bytes)
    }
}

/// Encode `bytes` as a `data:` URL.
#[must_use]
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("{SCHEME}{mime}{BASE64_MARKER},{}", BASE64.encode(bytes))
}

/// Length of the URL [`encode`] would produce, without building it.
#[must_use]
pub fn encoded_len(mime: &str, byte_len: usize) -> usize {
    SCHEME.len() + mime.len() + BASE64_MARKER.len() + 1 + byte_len.div_ceil(3) * 4
}

/// Best-guess MIME type for raw image bytes, defaulting to JPEG.
#[must_use]
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes).map_or("image/jpeg", |format| format.to_mime_type())
}
