//! Image payload decoding

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use glowii_compositor::encode_png;
use glowii_compositor::source::{decode_base, looks_like_svg, svg_dimensions, system_fonts};
use glowii_core::{AppError, AppResult, Dimensions, ImageData, ValidationError};
use image::ImageReader;

/// Decode a base64 payload, with or without a `data:image/...;base64,` prefix.
pub fn decode_payload(payload: &str) -> AppResult<ImageData> {
    let (declared_type, encoded) = split_data_url(payload.trim());
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AppError::format(format!("Invalid base64 image payload: {}", e)))?;

    let content_type = match declared_type {
        Some(ct) => ct.to_string(),
        None => sniff_content_type(&bytes).to_string(),
    };
    Ok(ImageData::new(bytes, content_type))
}

fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    let Some(rest) = payload.strip_prefix("data:") else {
        return (None, payload);
    };
    match rest.split_once(',') {
        Some((meta, data)) => {
            let content_type = meta
                .split(';')
                .next()
                .filter(|ct| !ct.is_empty());
            (content_type, data)
        }
        None => (None, payload),
    }
}

/// Content type from magic bytes, `application/octet-stream` when unknown.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Bmp) => "image/bmp",
        Ok(image::ImageFormat::Tiff) => "image/tiff",
        _ if looks_like_svg(bytes) => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Pixel dimensions from the image header, or the declared size of an SVG document.
/// Fails unless both are positive.
pub fn probe_dimensions(bytes: &[u8]) -> Result<Dimensions, ValidationError> {
    let (width, height) = if looks_like_svg(bytes) {
        svg_dimensions(bytes, &system_fonts())
            .map_err(|e| ValidationError::UnreadableImage(e.to_string()))?
    } else {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ValidationError::UnreadableImage(e.to_string()))?
            .into_dimensions()
            .map_err(|e| ValidationError::UnreadableImage(e.to_string()))?
    };

    let dimensions = Dimensions::new(width, height);
    if !dimensions.is_positive() {
        return Err(ValidationError::UnreadableImage(format!(
            "image has no area ({})",
            dimensions
        )));
    }
    Ok(dimensions)
}

/// Re-encode as PNG unless the bytes already are PNG. SVG documents are rasterized.
pub fn to_png(image: &ImageData) -> AppResult<Vec<u8>> {
    if matches!(image::guess_format(&image.bytes), Ok(image::ImageFormat::Png)) {
        return Ok(image.bytes.to_vec());
    }
    if looks_like_svg(&image.bytes) {
        let pixmap = decode_base(&image.bytes, &system_fonts())?;
        return encode_png(&pixmap);
    }

    let decoded = image::load_from_memory(&image.bytes)
        .map_err(|e| AppError::format(format!("Failed to decode image: {}", e)))?;
    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}
