//! PDF report endpoints.
//!
//! `GET /generar_pdf_fila/:id`    — single-record report, owner-scoped
//! `GET /descargar_pdf_general`   — multi-record report (all records for
//! superusers, own records otherwise)
//!
//! Image bytes are fetched fresh from the stored URL here and handed to
//! the synchronous renderers; a failed fetch degrades that frame only.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::db::history;
use crate::media::fetch_image_bytes;
use crate::models::HistoryRecord;
use crate::report::{general, single};

/// `GET /generar_pdf_fila/:id` — one-page clinical report.
pub async fn single_pdf(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = {
        let conn = ctx.open_db()?;
        history::get_history(&conn, id, Some(user.user_id))?
            .ok_or_else(|| ApiError::NotFound("No se encontró el registro.".into()))?
    };

    let image = fetch_record_image(&ctx, &record).await;
    let pdf = single::render(&record, image.as_deref())?;

    let filename = format!(
        "informe_rad_{}_{}.pdf",
        record.numero(),
        filename_component(&record.paciente_nombre)
    );
    tracing::info!(filename = %filename, "PDF generated");
    Ok(pdf_response(pdf, &filename))
}

/// `GET /descargar_pdf_general` — the history export. Superusers get the
/// complete archive, everyone else their own records.
pub async fn general_pdf(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<impl IntoResponse, ApiError> {
    let (records, filename) = {
        let conn = ctx.open_db()?;
        if user.is_superuser {
            (
                history::list_history(&conn, None)?,
                "historial_radiologico_completo.pdf".to_string(),
            )
        } else {
            (
                history::list_history(&conn, Some(user.user_id))?,
                format!("historial_rad_{}.pdf", filename_component(&user.username)),
            )
        }
    };

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let image = fetch_record_image(&ctx, &record).await;
        entries.push((record, image));
    }

    let pdf = general::render(&entries)?;
    tracing::info!(filename = %filename, pages = entries.len(), "General PDF generated");
    Ok(pdf_response(pdf, &filename))
}

/// Fetch a record's stored image for embedding. Fail-soft: a fetch error
/// is logged and the frame renders empty.
async fn fetch_record_image(ctx: &ApiContext, record: &HistoryRecord) -> Option<Vec<u8>> {
    let url = ctx.config.media_url(&record.storage_key);
    match fetch_image_bytes(&ctx.http, &url).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!(id = record.id, error = %e, "Report image fetch failed");
            None
        }
    }
}

fn pdf_response(pdf: Vec<u8>, filename: &str) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    let disposition = format!("attachment; filename=\"{filename}\"");
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    (StatusCode::OK, headers, pdf)
}

/// Make a string safe for a `Content-Disposition` filename: ASCII
/// alphanumerics kept, spaces and everything else collapsed to `_`.
fn filename_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_component_replaces_spaces_and_non_ascii() {
        assert_eq!(filename_component("Juan Pérez"), "Juan_P_rez");
        assert_eq!(filename_component("ana-maria.2"), "ana-maria.2");
    }
}
