//! History endpoints.
//!
//! `GET  /historial_med`               — own records, newest first
//! `GET  /historial_med_gene`          — all records (superuser)
//! `GET  /historial/ver/:id`           — one owned record
//! `POST /historial/eliminar/:id`      — delete an owned record
//! `POST /historial/eliminar/gene/:id` — delete any record (superuser)
//! `GET  /historial/stats`             — summary statistics

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::db::history;
use crate::models::{HistoryRecord, HistoryStats};

#[derive(Serialize)]
pub struct RecordView {
    pub id: i64,
    pub paciente_nombre: String,
    pub medico: String,
    pub grupo: String,
    pub porcentaje: f64,
    pub fecha_imagen: String,
    pub image_url: String,
}

fn record_view(ctx: &ApiContext, record: &HistoryRecord) -> RecordView {
    RecordView {
        id: record.id,
        paciente_nombre: record.paciente_nombre.clone(),
        medico: record.username.clone(),
        grupo: record.grupo.as_str().to_string(),
        porcentaje: record.porcentaje,
        fecha_imagen: record.fecha_imagen.to_rfc3339(),
        image_url: ctx.config.media_url(&record.storage_key),
    }
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub historial: Vec<RecordView>,
    pub total: usize,
}

/// `GET /historial_med` — the authenticated user's records.
pub async fn own(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let records = history::list_history(&conn, Some(user.user_id))?;
    let historial: Vec<_> = records.iter().map(|r| record_view(&ctx, r)).collect();
    Ok(Json(HistoryResponse {
        total: historial.len(),
        historial,
    }))
}

/// `GET /historial_med_gene` — every record, superuser only (enforced by
/// the route's middleware stack).
pub async fn all(State(ctx): State<ApiContext>) -> Result<Json<HistoryResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let records = history::list_history(&conn, None)?;
    let historial: Vec<_> = records.iter().map(|r| record_view(&ctx, r)).collect();
    Ok(Json(HistoryResponse {
        total: historial.len(),
        historial,
    }))
}

/// `GET /historial/ver/:id` — a single record, owner-scoped.
pub async fn view(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<RecordView>, ApiError> {
    let conn = ctx.open_db()?;
    let record = history::get_history(&conn, id, Some(user.user_id))?
        .ok_or_else(|| ApiError::NotFound("El recurso solicitado no fue encontrado.".into()))?;
    Ok(Json(record_view(&ctx, &record)))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// `POST /historial/eliminar/:id` — delete an owned record. An id that
/// belongs to a different owner reads as not-found.
pub async fn delete_own(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    delete_record(&ctx, id, Some(user.user_id)).await
}

/// `POST /historial/eliminar/gene/:id` — delete any record (superuser).
pub async fn delete_any(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    delete_record(&ctx, id, None).await
}

async fn delete_record(
    ctx: &ApiContext,
    id: i64,
    owner: Option<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut conn = ctx.open_db()?;
    let deleted = history::delete_history(&mut conn, &ctx.media, id, owner)?;

    if deleted {
        Ok(Json(DeleteResponse {
            message: "El registro ha sido eliminado correctamente.".into(),
        }))
    } else {
        Err(ApiError::NotFound("No se encontró el registro.".into()))
    }
}

/// `GET /historial/stats` — aggregate view; superusers see the global set.
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<HistoryStats>, ApiError> {
    let conn = ctx.open_db()?;
    let owner = if user.is_superuser {
        None
    } else {
        Some(user.user_id)
    };
    Ok(Json(history::history_stats(&conn, owner)?))
}
