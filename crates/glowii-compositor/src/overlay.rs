//! Overlay descriptors and partial updates

use glowii_core::{AppError, AppResult};

pub const MIN_FONT_SIZE: f32 = 12.0;
pub const MAX_FONT_SIZE: f32 = 72.0;
pub const MIN_IMAGE_SIZE: f32 = 20.0;
pub const MAX_IMAGE_SIZE: f32 = 200.0;

const DEFAULT_FONT_FAMILY: &str = "Arial";
const DEFAULT_FONT_SIZE: f32 = 20.0;
const DEFAULT_COLOR: &str = "#ffffff";
const DEFAULT_IMAGE_SIZE: f32 = 100.0;
const DEFAULT_POSITION: Position = Position { x: 50.0, y: 50.0 };

/// Overlay kinds, in draw order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Text,
    Image,
}

/// Point in surface pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Sanitized RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#rgb` or `#rrggbb`.
    pub fn parse_hex(value: &str) -> AppResult<Self> {
        let invalid = || AppError::format(format!("Invalid color: {}", value));
        let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Self {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                })
            }
            6 => Ok(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

pub(crate) fn clamp_rotation(degrees: f32) -> f32 {
    clamp_finite(degrees, -180.0, 180.0, 0.0)
}

pub(crate) fn clamp_opacity(opacity: f32) -> f32 {
    clamp_finite(opacity, 0.0, 1.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub font_family: String,
    pub font_size_px: f32,
    pub color: Rgb,
    pub position: Position,
    pub rotation_degrees: f32,
    pub opacity: f32,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size_px: DEFAULT_FONT_SIZE,
            color: Rgb {
                r: 0xff,
                g: 0xff,
                b: 0xff,
            },
            position: DEFAULT_POSITION,
            rotation_degrees: 0.0,
            opacity: 1.0,
        }
    }
}

impl TextOverlay {
    pub fn is_renderable(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Image overlay geometry. The decoded source lives with the compositor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlay {
    /// Rendered width in pixels
    pub size_px: f32,
    /// Source width / height
    pub aspect_ratio: f32,
    pub position: Position,
    pub rotation_degrees: f32,
    pub opacity: f32,
}

impl Default for ImageOverlay {
    fn default() -> Self {
        Self {
            size_px: DEFAULT_IMAGE_SIZE,
            aspect_ratio: 1.0,
            position: DEFAULT_POSITION,
            rotation_degrees: 0.0,
            opacity: 1.0,
        }
    }
}

impl ImageOverlay {
    /// Rendered `(width, height)`; height = size / aspect ratio.
    pub fn rendered_size(&self) -> (f32, f32) {
        (self.size_px, self.size_px / sanitize_aspect(self.aspect_ratio))
    }
}

/// Aspect ratio with missing, zero and non-finite values mapped to 1.
pub fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

/// Partial update of the text overlay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPatch {
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size_px: Option<f32>,
    /// `#rgb` or `#rrggbb`
    pub color_hex: Option<String>,
    pub position: Option<Position>,
    pub rotation_degrees: Option<f32>,
    pub opacity: Option<f32>,
}

impl TextPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Merge into `overlay`. Validation happens before any field is touched.
    pub(crate) fn apply_to(self, overlay: &mut TextOverlay) -> AppResult<()> {
        let color = self.color_hex.as_deref().map(Rgb::parse_hex).transpose()?;

        if let Some(text) = self.text {
            overlay.text = text;
        }
        if let Some(family) = self.font_family.filter(|f| !f.trim().is_empty()) {
            overlay.font_family = family;
        }
        if let Some(size) = self.font_size_px {
            overlay.font_size_px =
                clamp_finite(size, MIN_FONT_SIZE, MAX_FONT_SIZE, overlay.font_size_px);
        }
        if let Some(color) = color {
            overlay.color = color;
        }
        if let Some(position) = self.position {
            overlay.position = position;
        }
        if let Some(rotation) = self.rotation_degrees {
            overlay.rotation_degrees = clamp_rotation(rotation);
        }
        if let Some(opacity) = self.opacity {
            overlay.opacity = clamp_opacity(opacity);
        }
        Ok(())
    }
}

/// New source for the image overlay
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySource {
    pub file_name: String,
    pub bytes: bytes::Bytes,
}

impl OverlaySource {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<bytes::Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Partial update of the image overlay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagePatch {
    pub source: Option<OverlaySource>,
    pub size_px: Option<f32>,
    pub position: Option<Position>,
    pub rotation_degrees: Option<f32>,
    pub opacity: Option<f32>,
}

impl ImagePatch {
    pub fn source(source: OverlaySource) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    pub(crate) fn apply_geometry(&self, overlay: &mut ImageOverlay) {
        if let Some(size) = self.size_px {
            overlay.size_px = clamp_finite(size, MIN_IMAGE_SIZE, MAX_IMAGE_SIZE, overlay.size_px);
        }
        if let Some(position) = self.position {
            overlay.position = position;
        }
        if let Some(rotation) = self.rotation_degrees {
            overlay.rotation_degrees = clamp_rotation(rotation);
        }
        if let Some(opacity) = self.opacity {
            overlay.opacity = clamp_opacity(opacity);
        }
    }
}

/// Patch for either overlay kind
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayPatch {
    Text(TextPatch),
    Image(ImagePatch),
}

impl OverlayPatch {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlayPatch::Text(_) => OverlayKind::Text,
            OverlayPatch::Image(_) => OverlayKind::Image,
        }
    }
}
