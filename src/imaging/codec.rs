use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::OcrMcpError;

/// Decoded bitmap in a fixed 8-bit RGB layout.
///
/// Values are never mutated in place; every transform builds a new one, so a
/// caller can always fall back to the value it started from.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalImage {
    pixels: RgbImage,
}

impl CanonicalImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: image.into_rgb8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFormat {
    #[default]
    Png,
    Jpeg,
}

impl EncodeFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            EncodeFormat::Png => ImageFormat::Png,
            EncodeFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("data URL has no `,` separating the header from the payload")]
    MalformedDataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("unreadable image container: {0}")]
    Container(#[source] image::ImageError),
    #[error("image encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}

impl From<CodecError> for OcrMcpError {
    fn from(error: CodecError) -> Self {
        OcrMcpError::Decode(error.to_string())
    }
}

/// Strips an optional `data:<mime>;base64,` header.
pub fn strip_data_url(encoded: &str) -> Result<&str, CodecError> {
    let trimmed = encoded.trim();
    if !trimmed.starts_with("data:") {
        return Ok(trimmed);
    }
    trimmed
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or(CodecError::MalformedDataUrl)
}

/// Base64 text to raw container bytes, without decoding the container.
pub fn decode_base64(encoded: &str, allow_data_url_prefix: bool) -> Result<Vec<u8>, CodecError> {
    let payload = if allow_data_url_prefix {
        strip_data_url(encoded)?
    } else {
        encoded.trim()
    };
    let bytes = general_purpose::STANDARD.decode(payload)?;
    if bytes.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    Ok(bytes)
}

pub fn decode(encoded: &str, allow_data_url_prefix: bool) -> Result<CanonicalImage, CodecError> {
    let bytes = decode_base64(encoded, allow_data_url_prefix)?;
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<CanonicalImage, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let image = image::load_from_memory(bytes).map_err(CodecError::Container)?;
    let canonical = CanonicalImage::from_dynamic(image);
    debug!(
        width = canonical.width(),
        height = canonical.height(),
        "decoded image"
    );
    Ok(canonical)
}

pub fn encode_bytes(image: &CanonicalImage, format: EncodeFormat) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .pixels
        .write_to(&mut buffer, format.image_format())
        .map_err(CodecError::Encode)?;
    Ok(buffer.into_inner())
}

pub fn encode(image: &CanonicalImage, format: EncodeFormat) -> Result<String, CodecError> {
    let bytes = encode_bytes(image, format)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Footprint of the image re-encoded in the default format.
pub fn size_in_bytes(image: &CanonicalImage) -> Result<usize, CodecError> {
    encode_bytes(image, EncodeFormat::default()).map(|bytes| bytes.len())
}

/// Fails with [`OcrMcpError::Oversize`] when `size` is over `limit`.
pub fn ensure_within_limit(size: usize, limit: usize) -> crate::error::Result<()> {
    if size > limit {
        return Err(OcrMcpError::Oversize { size, limit });
    }
    Ok(())
}
