use std::path::Path;

/// Maximum accepted upload size (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Validation errors for files selected by the user
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid content type: {content_type} (expected an image type)")]
    InvalidContentType { content_type: String },

    #[error("Empty file")]
    EmptyFile,

    #[error("Unreadable image: {0}")]
    UnreadableImage(String),
}

/// Image file validator
///
/// Accepts any `image/*` content type up to a configurable size limit.
#[derive(Debug, Clone)]
pub struct MediaValidator {
    max_file_size: usize,
}

impl Default for MediaValidator {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES)
    }
}

impl MediaValidator {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate content type (must be `image/...`)
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();

        match normalized.strip_prefix("image/") {
            Some(subtype) if !subtype.is_empty() => Ok(()),
            _ => Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
            }),
        }
    }

    /// Validate all aspects of a selected file. Type is checked before size.
    pub fn validate_all(&self, content_type: &str, file_size: usize) -> Result<(), ValidationError> {
        self.validate_content_type(content_type)?;
        self.validate_file_size(file_size)?;
        Ok(())
    }
}

/// Map an image file extension to its expected content type.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        "ico" => Some("image/x-icon"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Guess the content type of a file from its name, falling back to `application/octet-stream`.
pub fn content_type_for_filename(filename: &str) -> &'static str {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(content_type_for_extension)
        .unwrap_or("application/octet-stream")
}

/// Whether a file name carries the `.svg` extension (case-insensitive).
pub fn is_svg_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}
