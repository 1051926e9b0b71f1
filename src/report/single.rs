//! Single-record radiology report: header band, image panel on the left,
//! clinical panels (patient, findings, confidence, interpretation) on the
//! right, disclaimer footer.

use printpdf::PdfLayerReference;

use crate::models::HistoryRecord;

use super::styles::*;
use super::{
    draw_image_frame, fill_circle, fill_rect, hline, stroke_rect, text_at, text_right,
    wrap_text, Frame, ReportDoc, ReportError, IN, PAGE_H, PAGE_W,
};

const INTERPRETACION_SIN_HERNIA: &[&str] = &[
    "El análisis automatizado mediante inteligencia artificial",
    "no identifica signos radiológicos compatibles con hernia",
    "diafragmática en el estudio actual.",
    "",
    "La estructura diafragmática presenta morfología íntegra,",
    "sin evidencia de soluciones de continuidad ni protrusión",
    "de contenido abdominal hacia la cavidad torácica.",
    "",
    "RECOMENDACIONES:",
    "- Correlación clínica según sintomatología",
    "- Seguimiento imagenológico si persisten síntomas",
    "- Valoración médica especializada",
];

const INTERPRETACION_HERNIA: &[&str] = &[
    "El análisis automatizado identifica hallazgos radiológicos",
    "compatibles con hernia diafragmática.",
    "",
    "Se observa posible alteración en la continuidad del",
    "diafragma con protrusión de estructuras que sugieren",
    "contenido abdominal hacia la cavidad torácica.",
    "",
    "RECOMENDACIONES PRIORITARIAS:",
    "- Evaluación médica especializada urgente",
    "- TC de tórax con contraste para caracterización",
    "- Interconsulta con cirugía torácica",
    "- Estudios complementarios según criterio clínico",
];

/// Render the report for one record. `image_bytes` is the stored
/// (annotated) image, pre-fetched by the caller; `None` degrades to an
/// empty frame.
pub fn render(
    record: &HistoryRecord,
    image_bytes: Option<&[u8]>,
) -> Result<Vec<u8>, ReportError> {
    let (doc, layer) = ReportDoc::new("INFORME RADIOLÓGICO")?;

    draw_header(&doc, &layer, record);
    draw_radiographic_image(&doc, &layer, record, image_bytes);
    draw_clinical_info(&doc, &layer, record);
    draw_footer(&doc, &layer);

    doc.finish()
}

fn draw_header(doc: &ReportDoc, layer: &PdfLayerReference, record: &HistoryRecord) {
    fill_rect(layer, 0.0, PAGE_H - HEADER_HEIGHT, PAGE_W, HEADER_HEIGHT, AZUL_OSCURO.into());

    layer.set_fill_color(BLANCO.into());
    text_at(layer, "INFORME RADIOLÓGICO", 18.0, MARGIN_H, PAGE_H - 0.45 * IN, &doc.bold);
    text_at(
        layer,
        "Departamento de Diagnóstico por Imagen",
        9.0,
        MARGIN_H,
        PAGE_H - 0.65 * IN,
        &doc.font,
    );
    text_right(
        layer,
        &format!("No. {}", record.numero()),
        8.0,
        PAGE_W - MARGIN_H,
        PAGE_H - 0.45 * IN,
        &doc.font,
    );

    hline(
        layer,
        MARGIN_H,
        PAGE_W - MARGIN_H,
        PAGE_H - HEADER_HEIGHT - 0.05 * IN,
        GRIS_LINEA.into(),
        0.5,
    );
}

fn draw_radiographic_image(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    record: &HistoryRecord,
    image_bytes: Option<&[u8]>,
) {
    let frame = Frame {
        x: MARGIN_H,
        y: PAGE_H - 9.8 * IN,
        w: 4.2 * IN,
        h: 7.8 * IN,
    };
    if !draw_image_frame(layer, image_bytes, frame, &doc.font) {
        tracing::warn!(id = record.id, "Report rendered without its image");
    }

    layer.set_fill_color(AZUL_MEDIO.into());
    text_at(
        layer,
        "Fig. 1 - Radiografía de tórax con marcación automatizada",
        8.0,
        frame.x,
        frame.y - 0.25 * IN,
        &doc.font,
    );
}

/// Boxed panel with the shared title treatment; returns nothing, the
/// caller tracks vertical flow.
fn section_box(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    x: f32,
    y_top: f32,
    w: f32,
    h: f32,
    title: &str,
    fill: Tone,
    underline_to: f32,
) {
    fill_rect(layer, x, y_top - h, w, h, fill.into());
    stroke_rect(layer, x, y_top - h, w, h, GRIS_LINEA.into(), 0.5);

    layer.set_fill_color(AZUL_MEDIO.into());
    text_at(layer, title, 9.0, x + 0.15 * IN, y_top - 0.25 * IN, &doc.bold);
    hline(layer, x + 0.15 * IN, underline_to, y_top - 0.35 * IN, AZUL_MEDIO.into(), 1.5);
}

fn draw_clinical_info(doc: &ReportDoc, layer: &PdfLayerReference, record: &HistoryRecord) {
    let x = 5.1 * IN;
    let w = 2.9 * IN;
    let mut y = PAGE_H - 1.3 * IN;

    y = draw_patient_data(doc, layer, record, x, y, w);
    y = draw_findings(doc, layer, record, x, y, w);
    y = draw_confidence_index(doc, layer, record, x, y, w);
    draw_interpretation(doc, layer, record, x, y, w);
}

fn draw_patient_data(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    record: &HistoryRecord,
    x: f32,
    y: f32,
    w: f32,
) -> f32 {
    section_box(doc, layer, x, y, w, 1.35 * IN, "DATOS DEL PACIENTE", FONDO_CLARO, x + 1.5 * IN);

    layer.set_fill_color(GRIS_TEXTO.into());
    text_at(layer, "Paciente:", 8.0, x + 0.15 * IN, y - 0.55 * IN, &doc.bold);
    text_at(layer, &record.paciente_nombre, 8.0, x + 0.15 * IN, y - 0.7 * IN, &doc.font);

    text_at(layer, "Médico solicitante:", 8.0, x + 0.15 * IN, y - 0.9 * IN, &doc.bold);
    text_at(layer, &record.username, 8.0, x + 0.15 * IN, y - 1.05 * IN, &doc.font);

    layer.set_fill_color(GRIS_CLARO.into());
    let fecha = record.fecha_imagen.format("%d/%m/%Y");
    let hora = record.fecha_imagen.format("%H:%M");
    text_at(
        layer,
        &format!("Fecha: {fecha} | Hora: {hora}"),
        7.0,
        x + 0.15 * IN,
        y - 1.25 * IN,
        &doc.font,
    );

    y - 1.65 * IN
}

fn draw_findings(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    record: &HistoryRecord,
    x: f32,
    y: f32,
    w: f32,
) -> f32 {
    section_box(doc, layer, x, y, w, 1.0 * IN, "HALLAZGOS", BLANCO, x + 1.1 * IN);

    let status = if record.grupo.is_negative() {
        VERDE_CLINICO
    } else {
        ROJO_CLINICO
    };
    fill_circle(layer, x + 0.25 * IN, y - 0.57 * IN, 0.08 * IN, status.into());

    layer.set_fill_color(GRIS_TEXTO.into());
    text_at(
        layer,
        &record.grupo.as_str().to_uppercase(),
        11.0,
        x + 0.45 * IN,
        y - 0.62 * IN,
        &doc.bold,
    );

    layer.set_fill_color(GRIS_CLARO.into());
    text_at(
        layer,
        &format!("Confiabilidad del análisis: {:.2}%", record.porcentaje),
        7.0,
        x + 0.45 * IN,
        y - 0.78 * IN,
        &doc.font,
    );

    y - 1.2 * IN
}

fn draw_confidence_index(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    record: &HistoryRecord,
    x: f32,
    y: f32,
    w: f32,
) -> f32 {
    section_box(doc, layer, x, y, w, 0.85 * IN, "ÍNDICE DE CONFIANZA", FONDO_CLARO, x + 1.6 * IN);

    let bar_x = x + 0.15 * IN;
    let bar_y = y - 0.55 * IN;
    let bar_w = w - 0.3 * IN;
    let bar_h = 0.12 * IN;

    fill_rect(layer, bar_x, bar_y, bar_w, bar_h, BARRA_FONDO.into());
    let filled = bar_w * (record.porcentaje as f32 / 100.0);
    if filled > 0.0 {
        fill_rect(layer, bar_x, bar_y, filled, bar_h, AZUL_MEDIO.into());
    }

    layer.set_fill_color(AZUL_MEDIO.into());
    text_right(
        layer,
        &format!("{:.2}%", record.porcentaje),
        16.0,
        x + w - 0.15 * IN,
        y - 0.75 * IN,
        &doc.bold,
    );

    y - 1.05 * IN
}

fn draw_interpretation(
    doc: &ReportDoc,
    layer: &PdfLayerReference,
    record: &HistoryRecord,
    x: f32,
    y: f32,
    w: f32,
) {
    section_box(
        doc,
        layer,
        x,
        y,
        w,
        2.6 * IN,
        "INTERPRETACIÓN RADIOLÓGICA",
        BLANCO,
        x + 2.1 * IN,
    );

    let texto = if record.grupo.is_negative() {
        INTERPRETACION_SIN_HERNIA
    } else {
        INTERPRETACION_HERNIA
    };

    layer.set_fill_color(GRIS_TEXTO.into());
    let mut text_y = y - 0.55 * IN;
    let line_height = 0.14 * IN;

    for linea in texto {
        let (size, font) = if linea.starts_with("RECOMENDACIONES") {
            (7.5, &doc.bold)
        } else if linea.starts_with('-') {
            (7.0, &doc.font)
        } else {
            (7.5, &doc.font)
        };
        text_at(layer, linea, size, x + 0.15 * IN, text_y, font);
        text_y -= line_height;
    }
}

fn draw_footer(doc: &ReportDoc, layer: &PdfLayerReference) {
    hline(layer, MARGIN_H, PAGE_W - MARGIN_H, 1.0 * IN, GRIS_LINEA.into(), 0.5);

    layer.set_fill_color(GRIS_CLARO.into());
    text_at(layer, "NOTA IMPORTANTE:", 7.0, MARGIN_H, 0.75 * IN, &doc.font);
    for (line, y) in [
        (
            "Este informe ha sido generado mediante análisis automatizado con inteligencia artificial y debe ser validado por un médico radiólogo certificado.",
            0.6 * IN,
        ),
        (
            "Los resultados deben interpretarse en el contexto clínico del paciente. No sustituye el criterio médico profesional.",
            0.47 * IN,
        ),
    ] {
        for wrapped in wrap_text(line, 150) {
            text_at(layer, &wrapped, 6.5, MARGIN_H, y, &doc.font);
        }
    }
}
