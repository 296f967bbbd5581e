//! Drawing routines onto the output surface

use std::io::Cursor;
use std::sync::Arc;

use glowii_core::{AppError, AppResult};
use image::{ImageFormat, RgbaImage};
use resvg::tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};
use usvg::fontdb::Database;

use crate::overlay::{ImageOverlay, TextOverlay};
use crate::source::parse_svg;

// Canvas-style drop shadow: offset 2,2, blur 4 (as a Gaussian deviation of 2), black at 50%.
const SHADOW_DX: f32 = 2.0;
const SHADOW_DY: f32 = 2.0;
const SHADOW_STD_DEVIATION: f32 = 2.0;
const SHADOW_OPACITY: f32 = 0.5;

const GENERIC_FAMILIES: &[&str] = &["serif", "sans-serif", "monospace", "cursive", "fantasy"];

/// Everything one redraw depends on
pub(crate) struct Scene<'a> {
    pub base: Option<&'a Pixmap>,
    pub text: &'a TextOverlay,
    pub image: &'a ImageOverlay,
    /// Raster to paint for the image overlay, `None` when no source is loaded
    pub image_raster: Option<&'a Pixmap>,
    pub fonts: &'a Arc<Database>,
}

pub(crate) fn render(surface: &mut Pixmap, scene: &Scene<'_>) -> AppResult<()> {
    surface.fill(Color::TRANSPARENT);

    if let Some(base) = scene.base {
        let sx = surface.width() as f32 / base.width() as f32;
        let sy = surface.height() as f32 / base.height() as f32;
        surface.draw_pixmap(
            0,
            0,
            base.as_ref(),
            &paint(1.0),
            Transform::from_scale(sx, sy),
            None,
        );
    }

    if scene.text.is_renderable() {
        draw_text(surface, scene.text, scene.fonts)?;
    }

    if let Some(raster) = scene.image_raster {
        draw_image(surface, scene.image, raster);
    }

    Ok(())
}

fn paint(opacity: f32) -> PixmapPaint {
    PixmapPaint {
        opacity,
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    }
}

fn draw_text(surface: &mut Pixmap, text: &TextOverlay, fonts: &Arc<Database>) -> AppResult<()> {
    let svg = text_svg(text, surface.width(), surface.height());
    let tree = parse_svg(svg.as_bytes(), fonts)
        .map_err(|e| AppError::Internal(format!("Failed to lay out watermark text: {}", e)))?;
    resvg::render(&tree, Transform::identity(), &mut surface.as_mut());
    Ok(())
}

/// Surface-sized SVG document holding the text overlay. The text baseline sits at the
/// overlay position.
pub(crate) fn text_svg(text: &TextOverlay, width: u32, height: u32) -> String {
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<defs><filter id="shadow" x="-50%" y="-50%" width="200%" height="200%">"#,
            r##"<feDropShadow dx="{dx}" dy="{dy}" stdDeviation="{sd}" flood-color="#000000" flood-opacity="{so}"/>"##,
            r#"</filter></defs>"#,
            r#"<g transform="translate({x} {y}) rotate({r})" opacity="{o}">"#,
            r#"<text x="0" y="0" font-family="{family}" font-size="{size}" fill="{fill}" filter="url(#shadow)" xml:space="preserve">{body}</text>"#,
            r#"</g></svg>"#
        ),
        w = width,
        h = height,
        dx = SHADOW_DX,
        dy = SHADOW_DY,
        sd = SHADOW_STD_DEVIATION,
        so = SHADOW_OPACITY,
        x = text.position.x,
        y = text.position.y,
        r = text.rotation_degrees,
        o = text.opacity,
        family = escape_xml(&font_family_list(&text.font_family)),
        size = text.font_size_px,
        fill = text.color.to_hex(),
        body = escape_xml(&text.text),
    )
}

/// CSS font-family list for `family`, ending in a generic family so that text still renders
/// when the named face is not installed.
fn font_family_list(family: &str) -> String {
    let family = family.trim();
    if family.is_empty() {
        "sans-serif".to_string()
    } else if GENERIC_FAMILIES.contains(&family.to_ascii_lowercase().as_str()) {
        family.to_string()
    } else if family.contains(',') {
        format!("{}, sans-serif", family)
    } else {
        format!("'{}', sans-serif", family)
    }
}

/// Top-left corner at the overlay position, rotated about that corner.
fn draw_image(surface: &mut Pixmap, overlay: &ImageOverlay, raster: &Pixmap) {
    let (width, height) = overlay.rendered_size();
    let transform = Transform::from_translate(overlay.position.x, overlay.position.y)
        .pre_rotate(overlay.rotation_degrees)
        .pre_scale(
            width / raster.width() as f32,
            height / raster.height() as f32,
        );
    surface.draw_pixmap(
        0,
        0,
        raster.as_ref(),
        &paint(overlay.opacity),
        transform,
        None,
    );
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Demultiplied RGBA copy of the surface
pub(crate) fn to_rgba_image(surface: &Pixmap) -> AppResult<RgbaImage> {
    let mut data = Vec::with_capacity(surface.data().len());
    for px in surface.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(surface.width(), surface.height(), data)
        .ok_or_else(|| AppError::Internal("Surface buffer size mismatch".to_string()))
}

/// Demultiply `surface` and encode it as PNG.
pub fn encode_png(surface: &Pixmap) -> AppResult<Vec<u8>> {
    let image = to_rgba_image(surface)?;
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}
