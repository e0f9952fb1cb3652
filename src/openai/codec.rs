use crate::error::{ProviderError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use std::io::Cursor;

/// Re-encode a reference image as a JPEG data URI.
///
/// Alpha-bearing images are flattened to RGB first since JPEG has no alpha
/// channel (palette images are already expanded to a direct-color buffer at
/// decode time by the `image` crate).
pub(crate) fn reference_data_uri(image: &DynamicImage) -> Result<String> {
    let flattened;
    let to_encode = if image.color().has_alpha() {
        flattened = DynamicImage::ImageRgb8(image.to_rgb8());
        &flattened
    } else {
        image
    };

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, 95);
    to_encode
        .write_with_encoder(encoder)
        .map_err(|e| ProviderError::ImageError(format!("failed to encode reference image: {}", e)))?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        BASE64.encode(buffer.into_inner())
    ))
}

/// Decode raw image bytes (any format the `image` crate recognizes).
pub(crate) fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| ProviderError::ImageError(format!("failed to decode image bytes: {}", e)))
}

/// Decode a bare base64 payload into an image.
pub(crate) fn decode_base64_image(b64: &str) -> Result<DynamicImage> {
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|e| ProviderError::ImageError(format!("invalid base64 image data: {}", e)))?;
    decode_image_bytes(&bytes)
}

/// Decode a `data:image/...;base64,...` URI into an image.
pub(crate) fn decode_data_uri(uri: &str) -> Result<DynamicImage> {
    let b64 = uri.splitn(2, ',').nth(1).ok_or_else(|| {
        ProviderError::ImageError(format!("malformed data URI (no comma separator): {}", uri))
    })?;
    decode_base64_image(b64)
}
