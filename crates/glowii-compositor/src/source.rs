//! Decoding of base rasters and overlay sources into premultiplied pixmaps

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use glowii_core::validation::is_svg_filename;
use glowii_core::{AppError, AppResult};
use image::ImageReader;
use resvg::tiny_skia::{IntSize, Pixmap, Transform};
use usvg::fontdb::Database;

use crate::overlay::{sanitize_aspect, OverlaySource};

const MAX_RASTER_DIM: u32 = 16_384;

const SANS_SERIF_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
];
const SERIF_FAMILIES: &[&str] = &[
    "Times New Roman",
    "Times",
    "Liberation Serif",
    "DejaVu Serif",
    "Noto Serif",
];
const MONOSPACE_FAMILIES: &[&str] = &[
    "Courier New",
    "Courier",
    "Liberation Mono",
    "DejaVu Sans Mono",
    "Noto Sans Mono",
];

/// Process-wide font database with system fonts loaded.
pub fn system_fonts() -> Arc<Database> {
    static FONTS: OnceLock<Arc<Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = Database::new();
            db.load_system_fonts();
            set_generic_families(&mut db);
            tracing::debug!(faces = db.len(), "Loaded system fonts");
            Arc::new(db)
        })
        .clone()
}

/// Point the generic families (`sans-serif`, `serif`, `monospace`) at installed faces,
/// preferring common metric-compatible families and falling back to any installed one.
pub fn set_generic_families(db: &mut Database) {
    let installed: Vec<String> = db
        .faces()
        .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
        .collect();
    let Some(fallback) = installed.first().cloned() else {
        tracing::warn!("No fonts installed; text overlays will not render");
        return;
    };

    let pick = |preferred: &[&str]| {
        preferred
            .iter()
            .find_map(|want| installed.iter().find(|name| name.eq_ignore_ascii_case(want)))
            .cloned()
            .unwrap_or_else(|| fallback.clone())
    };
    let sans_serif = pick(SANS_SERIF_FAMILIES);
    let serif = pick(SERIF_FAMILIES);
    let monospace = pick(MONOSPACE_FAMILIES);

    tracing::debug!(%sans_serif, %serif, %monospace, "Generic font families");
    db.set_sans_serif_family(sans_serif);
    db.set_serif_family(serif);
    db.set_monospace_family(monospace);
}

/// Decoded image overlay source
#[derive(Clone)]
pub enum DecodedSource {
    Raster(Pixmap),
    Vector(Arc<usvg::Tree>),
}

impl std::fmt::Debug for DecodedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (width, height) = self.intrinsic_size();
        let kind = match self {
            DecodedSource::Raster(_) => "Raster",
            DecodedSource::Vector(_) => "Vector",
        };
        f.debug_struct(kind)
            .field("width", &width)
            .field("height", &height)
            .finish()
    }
}

impl DecodedSource {
    /// Decode an overlay source. `.svg` files are parsed as vectors, everything else as rasters.
    pub fn decode(source: &OverlaySource, fonts: &Arc<Database>) -> AppResult<Self> {
        if is_svg_filename(&source.file_name) {
            let tree = parse_svg(&source.bytes, fonts)?;
            Ok(DecodedSource::Vector(Arc::new(tree)))
        } else {
            Ok(DecodedSource::Raster(decode_raster(&source.bytes)?))
        }
    }

    /// Intrinsic size; declared width/height for vectors.
    pub fn intrinsic_size(&self) -> (f32, f32) {
        match self {
            DecodedSource::Raster(pixmap) => (pixmap.width() as f32, pixmap.height() as f32),
            DecodedSource::Vector(tree) => (tree.size().width(), tree.size().height()),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.intrinsic_size();
        sanitize_aspect(w / h)
    }
}

/// Whether `bytes` hold an SVG document rather than an encoded raster.
pub fn looks_like_svg(bytes: &[u8]) -> bool {
    if image::guess_format(bytes).is_ok() {
        return false;
    }
    let head = &bytes[..bytes.len().min(1024)];
    String::from_utf8_lossy(head).contains("<svg")
}

/// Declared size of an SVG document in whole pixels.
pub fn svg_dimensions(bytes: &[u8], fonts: &Arc<Database>) -> AppResult<(u32, u32)> {
    let tree = parse_svg(bytes, fonts)?;
    Ok(pixel_size(&tree))
}

/// Decode a base image. SVG documents are rasterized at their declared size.
pub fn decode_base(bytes: &[u8], fonts: &Arc<Database>) -> AppResult<Pixmap> {
    if looks_like_svg(bytes) {
        let tree = parse_svg(bytes, fonts)?;
        let (width, height) = pixel_size(&tree);
        rasterize_svg(&tree, width, height)
    } else {
        decode_raster(bytes)
    }
}

fn pixel_size(tree: &usvg::Tree) -> (u32, u32) {
    (
        tree.size().width().ceil() as u32,
        tree.size().height().ceil() as u32,
    )
}

/// Decode encoded raster bytes into a premultiplied pixmap.
pub fn decode_raster(bytes: &[u8]) -> AppResult<Pixmap> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::format(format!("Unrecognized image data: {}", e)))?;
    let rgba = reader
        .decode()
        .map_err(|e| AppError::format(format!("Failed to decode image: {}", e)))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);

    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| AppError::format("Image has zero width or height"))?;
    Pixmap::from_vec(data, size).ok_or_else(|| AppError::format("Image buffer size mismatch"))
}

pub fn parse_svg(bytes: &[u8], fonts: &Arc<Database>) -> AppResult<usvg::Tree> {
    let opts = usvg::Options {
        fontdb: fonts.clone(),
        ..Default::default()
    };
    usvg::Tree::from_data(bytes, &opts)
        .map_err(|e| AppError::format(format!("Invalid SVG: {}", e)))
}

/// Rasterize an SVG tree to exactly `width` x `height`.
pub fn rasterize_svg(tree: &usvg::Tree, width: u32, height: u32) -> AppResult<Pixmap> {
    let width = width.clamp(1, MAX_RASTER_DIM);
    let height = height.clamp(1, MAX_RASTER_DIM);
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| AppError::Internal("Failed to allocate SVG pixmap".to_string()))?;

    let sx = width as f32 / tree.size().width();
    let sy = height as f32 / tree.size().height();
    resvg::render(tree, Transform::from_scale(sx, sy), &mut pixmap.as_mut());
    Ok(pixmap)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
