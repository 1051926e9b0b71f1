//! Multi-record history export: one page per record, newest first, with a
//! compact info table above a centered image frame and a generation
//! timestamp footer.

use printpdf::PdfLayerReference;

use crate::models::HistoryRecord;

use super::styles::*;
use super::{
    draw_image_frame, fill_rect, hline, text_at, text_centered, text_right, Frame, ReportDoc,
    ReportError, IN, PAGE_H, PAGE_W,
};

/// Render the tabular history report. Each entry pairs a record with its
/// pre-fetched image bytes (`None` degrades that frame only). Records are
/// rendered in the given order, one page each.
pub fn render(entries: &[(HistoryRecord, Option<Vec<u8>>)]) -> Result<Vec<u8>, ReportError> {
    let (doc, first_layer) = ReportDoc::new("HISTORIAL RADIOLÓGICO")?;
    let total = entries.len();

    for (index, (record, image_bytes)) in entries.iter().enumerate() {
        let layer = if index == 0 {
            first_layer.clone()
        } else {
            doc.add_page()
        };
        draw_page(&doc, &layer, record, image_bytes.as_deref(), index + 1, total);
    }

    doc.finish()
}

fn draw_page(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    record: &HistoryRecord,
    image_bytes: Option<&[u8]>,
    page_num: usize,
    total_pages: usize,
) {
    // Header band
    fill_rect(layer, 0.0, PAGE_H - 0.9 * IN, PAGE_W, 0.9 * IN, AZUL_OSCURO.into());
    layer.set_fill_color(BLANCO.into());
    text_at(layer, "HISTORIAL RADIOLÓGICO", 16.0, MARGIN_H, PAGE_H - 0.5 * IN, &doc.bold);
    text_right(
        layer,
        &format!("Registro {page_num} de {total_pages}"),
        8.0,
        PAGE_W - MARGIN_H,
        PAGE_H - 0.5 * IN,
        &doc.font,
    );

    let mut y = PAGE_H - 1.3 * IN;

    // Info table: three label/value rows in two column pairs, ruled above
    // and below.
    let table_top = y - 0.1 * IN;
    let rows: [[(&str, String); 2]; 3] = [
        [
            ("Paciente:", record.paciente_nombre.clone()),
            ("ID:", record.numero()),
        ],
        [
            ("Médico:", record.username.clone()),
            (
                "Fecha:",
                record.fecha_imagen.format("%d/%m/%Y %H:%M").to_string(),
            ),
        ],
        [
            ("Diagnóstico:", record.grupo.as_str().to_string()),
            ("Confianza:", format!("{:.2}%", record.porcentaje)),
        ],
    ];

    hline(layer, MARGIN_H, PAGE_W - MARGIN_H, table_top, GRIS_LINEA.into(), 0.5);
    layer.set_fill_color(GRIS_TEXTO.into());
    let mut row_y = table_top - 0.22 * IN;
    for row in &rows {
        let [(label_a, value_a), (label_b, value_b)] = row;
        text_at(layer, label_a, 8.0, MARGIN_H, row_y, &doc.bold);
        text_at(layer, value_a, 8.0, MARGIN_H + 1.0 * IN, row_y, &doc.font);
        text_at(layer, label_b, 8.0, MARGIN_H + 3.5 * IN, row_y, &doc.bold);
        text_at(layer, value_b, 8.0, MARGIN_H + 4.4 * IN, row_y, &doc.font);
        row_y -= 0.22 * IN;
    }
    hline(
        layer,
        MARGIN_H,
        PAGE_W - MARGIN_H,
        row_y + 0.08 * IN,
        GRIS_LINEA.into(),
        0.5,
    );

    y -= 1.4 * IN;

    // Centered image frame
    let img_w = 3.5 * IN;
    let img_h = 5.5 * IN;
    let frame = Frame {
        x: (PAGE_W - img_w) / 2.0,
        y: y - img_h,
        w: img_w,
        h: img_h,
    };
    if !draw_image_frame(layer, image_bytes, frame, &doc.font) {
        tracing::warn!(id = record.id, "History page rendered without its image");
    }

    // Footer
    layer.set_fill_color(GRIS_MUY_CLARO.into());
    text_centered(
        layer,
        &format!("Generado: {}", record.fecha_imagen.format("%d/%m/%Y %H:%M:%S")),
        7.0,
        PAGE_W / 2.0,
        0.4 * IN,
        &doc.font,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnosis;
    use chrono::{FixedOffset, TimeZone};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn record(id: i64, grupo: Diagnosis) -> HistoryRecord {
        HistoryRecord {
            id,
            user_id: 1,
            username: "dra.lopez".into(),
            image_id: id,
            storage_key: format!("{id}.jpg"),
            paciente_nombre: "Juan Pérez".into(),
            grupo,
            porcentaje: 64.5,
            fecha_imagen: FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 3, 1, 10, 30, 0)
                .unwrap(),
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(100, 140, Rgb([90, 90, 90]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn renders_one_page_per_record() {
        let entries = vec![
            (record(1, Diagnosis::Hernia), Some(png_bytes())),
            (record(2, Diagnosis::SinHernia), None),
            (record(3, Diagnosis::Hernia), Some(b"not an image".to_vec())),
        ];
        let bytes = render(&entries).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // Three pages in the page tree.
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"), "expected 3 pages");
    }

    #[test]
    fn renders_empty_history() {
        let bytes = render(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
