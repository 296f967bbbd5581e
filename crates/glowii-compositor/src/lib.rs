//! Watermark compositor
//!
//! Renders a base raster and up to two overlays (text, then image) onto a fixed-size surface
//! using `resvg`/`tiny-skia`, and exports the flattened result as PNG.

pub mod compositor;
pub mod overlay;
pub mod source;
mod surface;

pub use compositor::Compositor;
pub use surface::encode_png;
pub use overlay::{
    ImageOverlay, ImagePatch, OverlayKind, OverlayPatch, OverlaySource, Position, Rgb,
    TextOverlay, TextPatch,
};

/// File name used for exported watermarked images
pub const EXPORT_FILE_NAME: &str = "watermarked-image.png";
