//! Annotation rendering: overlay predicted polygons on the source image.
//!
//! Per prediction with a polygon: a 40%-opacity fill in the fixed
//! highlight color (the fill does NOT vary by class — only outline and
//! label do; the asymmetry is inherited product behavior), a 2 px outline
//! colored by class, and a confidence label above the polygon's bounding
//! box. Predictions without points are skipped silently; one malformed
//! prediction is logged and skipped without failing the rest. Output is
//! always JPEG at quality 95.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::FontVec;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut, draw_text_mut};
use imageproc::pixelops::interpolate;
use imageproc::point::Point;
use thiserror::Error;

use crate::models::Prediction;

/// Fixed highlight fill, regardless of predicted class.
const FILL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Outline/label color for the negative class.
const NEGATIVE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Outline/label color for every other class.
const POSITIVE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const FILL_OPACITY: f32 = 0.4;
const OUTLINE_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;
const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to encode annotated image: {0}")]
    Encode(#[from] image::ImageError),
}

fn class_color(class: &str) -> Rgb<u8> {
    if class == "Sin Hernia" {
        NEGATIVE_COLOR
    } else {
        POSITIVE_COLOR
    }
}

pub struct AnnotationRenderer {
    label_font: Option<FontVec>,
}

impl AnnotationRenderer {
    pub fn new(label_font: Option<FontVec>) -> Self {
        Self { label_font }
    }

    /// Load the label font from the configured path. A missing or invalid
    /// font disables labels (warned once here); fills and outlines are
    /// unaffected.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        let label_font = path.and_then(|p| match std::fs::read(p) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "Label font unusable");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "Label font unreadable");
                None
            }
        });
        if label_font.is_none() {
            tracing::warn!("No label font available; annotations will omit text labels");
        }
        Self { label_font }
    }

    /// Draw all predictions onto a copy of `image` and re-encode as JPEG.
    pub fn render(
        &self,
        image: &DynamicImage,
        predictions: &[Prediction],
    ) -> Result<Vec<u8>, AnnotateError> {
        let mut canvas = image.to_rgb8();

        for prediction in predictions {
            let Some(points) = prediction.points.as_deref() else {
                continue;
            };
            if let Err(reason) = self.draw_prediction(&mut canvas, prediction, points) {
                tracing::warn!(
                    class = %prediction.class,
                    reason,
                    "Skipping prediction that failed to render"
                );
            }
        }

        let mut out = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        DynamicImage::ImageRgb8(canvas).write_with_encoder(encoder)?;
        Ok(out.into_inner())
    }

    fn draw_prediction(
        &self,
        canvas: &mut RgbImage,
        prediction: &Prediction,
        points: &[crate::models::PredictionPoint],
    ) -> Result<(), &'static str> {
        let mut polygon: Vec<Point<i32>> = points
            .iter()
            .map(|p| Point::new(p.x as i32, p.y as i32))
            .collect();
        // draw_polygon_mut rejects a closing point equal to the first.
        if polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }
        if polygon.len() < 3 {
            return Err("polygon has fewer than 3 distinct points");
        }

        // Translucent fill: fill a copy, then blend it back at fixed
        // opacity, which confines the blend to the polygon region.
        let mut overlay = canvas.clone();
        draw_polygon_mut(&mut overlay, &polygon, FILL_COLOR);
        for (base, over) in canvas.pixels_mut().zip(overlay.pixels()) {
            *base = interpolate(*over, *base, FILL_OPACITY);
        }

        let color = class_color(&prediction.class);
        draw_outline(canvas, &polygon, color);

        let x_min = polygon.iter().map(|p| p.x).min().unwrap_or(0);
        let y_min = polygon.iter().map(|p| p.y).min().unwrap_or(0);
        if let Some(font) = &self.label_font {
            let label = prediction.label();
            let y = (y_min - 10 - LABEL_SCALE as i32).max(0);
            draw_text_mut(canvas, color, x_min.max(0), y, LABEL_SCALE, font, &label);
        }

        Ok(())
    }
}

/// Stroke the closed polygon edge with the configured thickness.
fn draw_outline(canvas: &mut RgbImage, polygon: &[Point<i32>], color: Rgb<u8>) {
    for offset in 0..OUTLINE_THICKNESS {
        let d = offset as f32;
        for window in 0..polygon.len() {
            let a = polygon[window];
            let b = polygon[(window + 1) % polygon.len()];
            draw_line_segment_mut(
                canvas,
                (a.x as f32 + d, a.y as f32 + d),
                (b.x as f32 + d, b.y as f32 + d),
                color,
            );
        }
    }
}
