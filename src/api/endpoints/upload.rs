//! Upload endpoint — the entry point of the whole pipeline.
//!
//! `GET  /subir` — upload constraints for the client form
//! `POST /subir` — multipart (imagen + paciente_nombre) ⇒ validate, infer,
//! annotate, persist, and return the stored verdict.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::pipeline::process_upload;

#[derive(Serialize)]
pub struct UploadInfo {
    pub allowed_extensions: &'static [&'static str],
    pub max_file_size: u64,
    pub min_dimension: u32,
    pub max_dimension: u32,
}

/// `GET /subir` — validation limits for the upload form.
pub async fn info(State(ctx): State<ApiContext>) -> Json<UploadInfo> {
    let limits = &ctx.config.limits;
    Json(UploadInfo {
        allowed_extensions: limits.allowed_extensions,
        max_file_size: limits.max_file_size,
        min_dimension: limits.min_dimension,
        max_dimension: limits.max_dimension,
    })
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub historial_id: i64,
    pub grupo: String,
    pub porcentaje: f64,
    pub paciente_nombre: String,
    pub fecha_imagen: String,
    pub processed_image_url: String,
    pub predicciones: usize,
}

/// `POST /subir` — run the full upload pipeline for one image.
pub async fn subir(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut paciente_nombre: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Formulario inválido: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("imagen") => {
                filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Archivo ilegible: {e}")))?;
                bytes = Some(data.to_vec());
            }
            Some("paciente_nombre") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Formulario inválido: {e}")))?;
                paciente_nombre = Some(value);
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| {
        ApiError::BadRequest("Debes seleccionar una imagen para subir.".into())
    })?;
    let bytes = bytes.ok_or_else(|| {
        ApiError::BadRequest("Debes seleccionar una imagen para subir.".into())
    })?;
    let paciente_nombre = paciente_nombre
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("El nombre del paciente es obligatorio.".into())
        })?;

    let mut conn = ctx.open_db()?;
    let outcome = process_upload(
        &ctx.config,
        &ctx.media,
        &ctx.inference,
        &ctx.annotator,
        &mut conn,
        user.user_id,
        &filename,
        &bytes,
        &paciente_nombre,
    )
    .await?;

    Ok(Json(UploadResponse {
        message: "Imagen procesada exitosamente.".into(),
        historial_id: outcome.record.id,
        grupo: outcome.record.grupo.as_str().to_string(),
        porcentaje: outcome.record.porcentaje,
        paciente_nombre: outcome.record.paciente_nombre.clone(),
        fecha_imagen: outcome.record.fecha_imagen.to_rfc3339(),
        processed_image_url: outcome.processed_image_url,
        predicciones: outcome.prediction_count,
    }))
}
