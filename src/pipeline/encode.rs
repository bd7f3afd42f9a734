//! Image encoding: page image file → base64 payload + MIME type.
//!
//! Vision APIs take images as base64 strings embedded in the JSON request
//! body, tagged with a media type. The media type must match the bytes or
//! the API rejects the request, so the content is sniffed first and the
//! extension is only a fallback.

use crate::error::{OcrError, OcrResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Media type used when neither content nor extension identify the image.
pub const DEFAULT_MIME: &str = "image/png";

/// A base64-encoded image ready to embed in a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard-alphabet base64, no data-URI prefix.
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// Convert into the multimodal attachment type used by `edgequake_llm`.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type).with_detail("high")
    }
}

/// Read and encode an image file.
pub async fn encode_file(path: &Path) -> OcrResult<EncodedImage> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| OcrError::io("Failed to read page image", path, e))?;
    let encoded = encode_bytes(&bytes, path);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        path.display(),
        encoded.mime_type,
        encoded.data.len()
    );
    Ok(encoded)
}

/// Encode raw image bytes; `path` is only consulted for its extension.
pub fn encode_bytes(bytes: &[u8], path: &Path) -> EncodedImage {
    EncodedImage {
        data: STANDARD.encode(bytes),
        mime_type: detect_mime(bytes, path),
    }
}

/// Media type for an image: magic bytes first, then extension, then PNG.
pub fn detect_mime(bytes: &[u8], path: &Path) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        if let Some(mime) = mime_for_format(format) {
            return mime;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(mime_for_extension)
        .unwrap_or(DEFAULT_MIME)
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
