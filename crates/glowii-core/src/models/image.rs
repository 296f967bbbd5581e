use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Encoded image bytes together with their content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Bytes,
    pub content_type: String,
}

impl ImageData {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pixel dimensions of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One candidate image returned by the enhancement service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementOption {
    /// 1-based option number as known by the remote service
    pub option_number: u32,
    pub image: ImageData,
    pub dimensions: Dimensions,
}
