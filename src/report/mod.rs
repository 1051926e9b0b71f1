//! Clinical PDF reports.
//!
//! Two layouts over a fixed Letter page: the single-record radiology
//! report (`single`) and the multi-record history export (`general`).
//! Both are stateless single-pass layout routines fed pre-fetched image
//! bytes; a missing or undecodable image degrades to an empty bordered
//! frame, never a failed report.
//!
//! PDF generation via `printpdf` with built-in Helvetica fonts. Images are
//! embedded from memory — no temporary files.

pub mod general;
pub mod single;
pub mod styles;

use printpdf::utils::{calculate_points_for_circle, calculate_points_for_rect};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, PdfPageIndex, Polygon,
};
use thiserror::Error;

use styles::{GRIS_LINEA, GRIS_TEXTO};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF build failed: {0}")]
    Build(String),
}

/// Letter page, in millimetres.
pub const PAGE_W: f32 = 215.9;
pub const PAGE_H: f32 = 279.4;

/// Inches → millimetres; the layout grid is specified in inches.
pub const IN: f32 = 25.4;
const PT_TO_MM: f32 = 0.352_778;

/// Wrap a float into `Mm` without committing to the wrapped float width.
pub(crate) fn mm(v: f32) -> Mm {
    Mm(v as _)
}

/// Approximate rendered width of Helvetica text, for right/centre
/// alignment of short strings (average glyph ≈ 0.5 em).
pub(crate) fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * 0.5 * PT_TO_MM
}

/// Document under construction plus the two fonts every layout uses.
pub(crate) struct ReportDoc {
    pub doc: PdfDocumentReference,
    pub font: IndirectFontRef,
    pub bold: IndirectFontRef,
}

impl ReportDoc {
    pub fn new(title: &str) -> Result<(Self, PdfLayerReference), ReportError> {
        let (doc, page, layer) = PdfDocument::new(title, mm(PAGE_W), mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Build(format!("font: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Build(format!("font: {e}")))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok((Self { doc, font, bold }, layer))
    }

    pub fn add_page(&self) -> PdfLayerReference {
        let (page, layer): (PdfPageIndex, _) =
            self.doc.add_page(mm(PAGE_W), mm(PAGE_H), "Layer 1");
        self.doc.get_page(page).get_layer(layer)
    }

    pub fn finish(self) -> Result<Vec<u8>, ReportError> {
        let mut buf = std::io::BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| ReportError::Build(format!("save: {e}")))?;
        buf.into_inner()
            .map_err(|e| ReportError::Build(format!("buffer: {e}")))
    }
}

// ─── Drawing primitives ───────────────────────────────────────────────────────

/// Filled rectangle anchored at its bottom-left corner.
pub(crate) fn fill_rect(layer: &PdfLayerReference, x: f32, y: f32, w: f32, h: f32, color: Color) {
    layer.set_fill_color(color);
    let points = calculate_points_for_rect(mm(w), mm(h), mm(x + w / 2.0), mm(y + h / 2.0));
    layer.add_polygon(Polygon {
        rings: vec![points],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
}

/// Stroked rectangle anchored at its bottom-left corner.
pub(crate) fn stroke_rect(
    layer: &PdfLayerReference,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    color: Color,
    thickness: f32,
) {
    layer.set_outline_color(color);
    layer.set_outline_thickness(thickness as _);
    let points = calculate_points_for_rect(mm(w), mm(h), mm(x + w / 2.0), mm(y + h / 2.0));
    layer.add_line(Line {
        points,
        is_closed: true,
    });
}

pub(crate) fn fill_circle(layer: &PdfLayerReference, cx: f32, cy: f32, radius: f32, color: Color) {
    layer.set_fill_color(color);
    let points = calculate_points_for_circle(mm(radius), mm(cx), mm(cy));
    layer.add_polygon(Polygon {
        rings: vec![points],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
}

pub(crate) fn hline(layer: &PdfLayerReference, x1: f32, x2: f32, y: f32, color: Color, thickness: f32) {
    layer.set_outline_color(color);
    layer.set_outline_thickness(thickness as _);
    layer.add_line(Line {
        points: vec![
            (printpdf::Point::new(mm(x1), mm(y)), false),
            (printpdf::Point::new(mm(x2), mm(y)), false),
        ],
        is_closed: false,
    });
}

pub(crate) fn text_right(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    right_x: f32,
    y: f32,
    font: &IndirectFontRef,
) {
    layer.use_text(text, size as _, mm(right_x - text_width_mm(text, size)), mm(y), font);
}

pub(crate) fn text_centered(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    center_x: f32,
    y: f32,
    font: &IndirectFontRef,
) {
    layer.use_text(
        text,
        size as _,
        mm(center_x - text_width_mm(text, size) / 2.0),
        mm(y),
        font,
    );
}

pub(crate) fn text_at(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    x: f32,
    y: f32,
    font: &IndirectFontRef,
) {
    layer.use_text(text, size as _, mm(x), mm(y), font);
}

// ─── Image embedding ──────────────────────────────────────────────────────────

/// Bordered image frame, bottom-left anchored, in millimetres.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

const FRAME_INSET: f32 = 0.05 * IN;
const EMBED_DPI: f32 = 300.0;

/// Draw the frame border and embed `bytes` centred inside, preserving
/// aspect ratio. On missing/undecodable bytes the frame stays empty with a
/// placeholder note: one bad image never fails the page.
/// Returns whether an image was actually drawn.
pub(crate) fn draw_image_frame(
    layer: &PdfLayerReference,
    bytes: Option<&[u8]>,
    frame: Frame,
    placeholder_font: &IndirectFontRef,
) -> bool {
    stroke_rect(layer, frame.x, frame.y, frame.w, frame.h, GRIS_LINEA.into(), 1.0);

    let decoded = bytes.and_then(|b| match printpdf::image_crate::load_from_memory(b) {
        Ok(img) => Some(img),
        Err(e) => {
            tracing::error!(error = %e, "Report image failed to decode");
            None
        }
    });

    let Some(img) = decoded else {
        layer.set_fill_color(GRIS_TEXTO.into());
        text_centered(
            layer,
            "Imagen no disponible",
            9.0,
            frame.x + frame.w / 2.0,
            frame.y + frame.h / 2.0,
            placeholder_font,
        );
        return false;
    };

    // Resample so the bitmap lands inside the frame at the embed DPI;
    // `resize` preserves aspect ratio within the bounds.
    let inner_w = frame.w - 2.0 * FRAME_INSET;
    let inner_h = frame.h - 2.0 * FRAME_INSET;
    let target_w = (inner_w / IN * EMBED_DPI).round().max(1.0) as u32;
    let target_h = (inner_h / IN * EMBED_DPI).round().max(1.0) as u32;
    let resized = img.resize(
        target_w,
        target_h,
        printpdf::image_crate::imageops::FilterType::Triangle,
    );

    let drawn_w = resized.width() as f32 * IN / EMBED_DPI;
    let drawn_h = resized.height() as f32 * IN / EMBED_DPI;
    let x = frame.x + (frame.w - drawn_w) / 2.0;
    let y = frame.y + (frame.h - drawn_h) / 2.0;

    let rgb = printpdf::image_crate::DynamicImage::ImageRgb8(resized.to_rgb8());
    let pdf_image = printpdf::Image::from_dynamic_image(&rgb);
    pdf_image.add_to_layer(
        layer.clone(),
        printpdf::ImageTransform {
            translate_x: Some(mm(x)),
            translate_y: Some(mm(y)),
            dpi: Some(300.0),
            ..Default::default()
        },
    );
    true
}

/// Word-wrap for the fixed-width interpretation panels.
pub(crate) fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(current.clone());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
