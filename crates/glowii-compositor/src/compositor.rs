use std::sync::Arc;

use bytes::Bytes;
use glowii_core::validation::is_svg_filename;
use glowii_core::{AppError, AppResult};
use resvg::tiny_skia::Pixmap;
use usvg::fontdb::Database;

use crate::overlay::{
    ImageOverlay, ImagePatch, OverlayKind, OverlayPatch, OverlaySource, Position, TextOverlay,
    TextPatch,
};
use crate::source::{decode_base, rasterize_svg, system_fonts, DecodedSource};
use crate::surface::{self, Scene};

/// Fixed-size watermark canvas: a base raster plus one text and one image overlay.
///
/// Every mutating call redraws the surface, so [`Compositor::export_flattened`] always reflects
/// the latest state.
pub struct Compositor {
    surface: Pixmap,
    fonts: Arc<Database>,
    base_bytes: Option<Bytes>,
    base: Option<Pixmap>,
    base_decodes: u64,
    text: TextOverlay,
    image: ImageOverlay,
    source: Option<DecodedSource>,
    /// Vector source rasterized at the current rendered size
    vector_raster: Option<Pixmap>,
    active: Option<OverlayKind>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("width", &self.surface.width())
            .field("height", &self.surface.height())
            .field("has_base", &self.base.is_some())
            .field("text", &self.text)
            .field("image", &self.image)
            .field("has_image_source", &self.source.is_some())
            .field("active", &self.active)
            .finish()
    }
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> AppResult<Self> {
        Self::with_fonts(width, height, system_fonts())
    }

    pub fn with_fonts(width: u32, height: u32, fonts: Arc<Database>) -> AppResult<Self> {
        let surface = Pixmap::new(width, height).ok_or_else(|| {
            AppError::Internal(format!("Invalid canvas size {}x{}", width, height))
        })?;

        Ok(Self {
            surface,
            fonts,
            base_bytes: None,
            base: None,
            base_decodes: 0,
            text: TextOverlay::default(),
            image: ImageOverlay::default(),
            source: None,
            vector_raster: None,
            active: None,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }

    /// Decode and cache the base image (raster or SVG), then redraw.
    pub fn load_base(&mut self, raster: impl Into<Bytes>) -> AppResult<()> {
        let raster = raster.into();
        let decoded = decode_base(&raster, &self.fonts)?;
        self.base_decodes += 1;
        self.base = Some(decoded);
        self.base_bytes = Some(raster);
        self.redraw()
    }

    pub fn set_overlay(&mut self, patch: OverlayPatch) -> AppResult<()> {
        match patch {
            OverlayPatch::Text(patch) => self.set_text(patch),
            OverlayPatch::Image(patch) => self.set_image(patch),
        }
    }

    pub fn set_text(&mut self, patch: TextPatch) -> AppResult<()> {
        let mut next = self.text.clone();
        patch.apply_to(&mut next)?;
        self.text = next;
        self.redraw()
    }

    /// Merge an image patch. A new source is decoded before anything changes and sets the
    /// aspect ratio used by the following redraw.
    pub fn set_image(&mut self, patch: ImagePatch) -> AppResult<()> {
        let decoded = patch
            .source
            .as_ref()
            .map(|source| DecodedSource::decode(source, &self.fonts))
            .transpose()?;

        if let Some(decoded) = decoded {
            self.image.aspect_ratio = decoded.aspect_ratio();
            tracing::debug!(
                aspect_ratio = self.image.aspect_ratio,
                vector = matches!(decoded, DecodedSource::Vector(_)),
                "Overlay source loaded"
            );
            self.source = Some(decoded);
            self.vector_raster = None;
        }

        let before = self.image.rendered_size();
        patch.apply_geometry(&mut self.image);
        if self.image.rendered_size() != before {
            self.vector_raster = None;
        }

        self.redraw()
    }

    /// Load an `.svg` file as the image overlay source.
    pub fn load_vector_overlay(&mut self, source: OverlaySource) -> AppResult<()> {
        if !is_svg_filename(&source.file_name) {
            return Err(AppError::format("Please select an SVG file."));
        }
        self.set_image(ImagePatch::source(source))
    }

    /// Select the overlay that pointer events move.
    pub fn set_active(&mut self, kind: Option<OverlayKind>) {
        self.active = kind;
    }

    /// Explicit selection wins; otherwise the single renderable overlay, if exactly one is.
    pub fn active_overlay(&self) -> Option<OverlayKind> {
        if self.active.is_some() {
            return self.active;
        }
        match (self.text.is_renderable(), self.source.is_some()) {
            (true, false) => Some(OverlayKind::Text),
            (false, true) => Some(OverlayKind::Image),
            _ => None,
        }
    }

    /// Map a pointer event from display coordinates to surface coordinates and move the active
    /// overlay there. Returns the overlay that moved.
    pub fn handle_pointer(
        &mut self,
        x: f32,
        y: f32,
        display_width: f32,
        display_height: f32,
    ) -> AppResult<Option<OverlayKind>> {
        let Some(kind) = self.active_overlay() else {
            tracing::debug!("Pointer ignored: no active overlay");
            return Ok(None);
        };

        let ratio = |surface: u32, display: f32| {
            if display.is_finite() && display > 0.0 {
                surface as f32 / display
            } else {
                1.0
            }
        };
        let position = Position::new(
            x * ratio(self.surface.width(), display_width),
            y * ratio(self.surface.height(), display_height),
        );

        match kind {
            OverlayKind::Text => self.text.position = position,
            OverlayKind::Image => self.image.position = position,
        }
        self.redraw()?;
        Ok(Some(kind))
    }

    /// Clear, draw the base scaled to the surface, then text, then image.
    pub fn redraw(&mut self) -> AppResult<()> {
        self.prepare_vector_raster()?;

        let image_raster = match &self.source {
            Some(DecodedSource::Raster(pixmap)) => Some(pixmap),
            Some(DecodedSource::Vector(_)) => self.vector_raster.as_ref(),
            None => None,
        };
        let scene = Scene {
            base: self.base.as_ref(),
            text: &self.text,
            image: &self.image,
            image_raster,
            fonts: &self.fonts,
        };
        surface::render(&mut self.surface, &scene)
    }

    fn prepare_vector_raster(&mut self) -> AppResult<()> {
        if self.vector_raster.is_some() {
            return Ok(());
        }
        if let Some(DecodedSource::Vector(tree)) = &self.source {
            let (width, height) = self.image.rendered_size();
            let raster = rasterize_svg(tree, width.ceil() as u32, height.ceil() as u32)?;
            self.vector_raster = Some(raster);
        }
        Ok(())
    }

    /// Restore overlay defaults, drop the overlay source and re-decode the base.
    pub fn reset(&mut self) -> AppResult<()> {
        self.text = TextOverlay::default();
        self.image = ImageOverlay::default();
        self.source = None;
        self.vector_raster = None;
        self.active = None;

        self.base = None;
        if let Some(raster) = self.base_bytes.clone() {
            self.base = Some(decode_base(&raster, &self.fonts)?);
            self.base_decodes += 1;
        }
        self.redraw()
    }

    /// PNG encoding of the current surface.
    pub fn export_flattened(&self) -> AppResult<Vec<u8>> {
        surface::encode_png(&self.surface)
    }

    pub fn text_overlay(&self) -> &TextOverlay {
        &self.text
    }

    pub fn image_overlay(&self) -> &ImageOverlay {
        &self.image
    }

    pub fn has_image_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Number of times the base raster has been decoded.
    pub fn base_decode_count(&self) -> u64 {
        self.base_decodes
    }

    /// Demultiplied RGBA of one surface pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.surface.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Raw premultiplied surface bytes.
    pub fn surface_data(&self) -> &[u8] {
        self.surface.data()
    }
}
