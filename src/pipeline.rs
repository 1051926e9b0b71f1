//! The upload pipeline: validate → store → infer → annotate → overwrite →
//! extract → persist.
//!
//! One linear pass per request, no retries. All database writes happen in
//! a single transaction at the very end, so an inference or annotation
//! failure aborts the run and leaves the already-written pre-annotation
//! blob linked to nothing.

use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;

use crate::annotate::{AnnotateError, AnnotationRenderer};
use crate::config::AppConfig;
use crate::db::history::{create_history, HistoryError, NewHistory};
use crate::extract::{extract, Extraction};
use crate::inference::{InferenceClient, InferenceError};
use crate::media::{storage_key, MediaError, MediaStore};
use crate::models::HistoryRecord;
use crate::validate::{validate_upload, ValidationError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Blob store error: {0}")]
    Media(#[from] MediaError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Annotation(#[from] AnnotateError),

    #[error(transparent)]
    History(#[from] HistoryError),

    /// The model returned an empty prediction list; the sentinel verdict
    /// cannot be persisted, so the run aborts without a record.
    #[error("El modelo no produjo ninguna predicción")]
    NoPrediction,
}

/// Result of a successful run, as shown back to the uploader.
#[derive(Debug)]
pub struct UploadOutcome {
    pub record: HistoryRecord,
    pub prediction_count: usize,
    pub processed_image_url: String,
}

/// Run the full upload pipeline for one file.
#[allow(clippy::too_many_arguments)]
pub async fn process_upload(
    config: &AppConfig,
    media: &MediaStore,
    inference: &InferenceClient,
    annotator: &AnnotationRenderer,
    conn: &mut Connection,
    user_id: i64,
    filename: &str,
    bytes: &[u8],
    paciente_nombre: &str,
) -> Result<UploadOutcome, PipelineError> {
    let validated = validate_upload(filename, bytes, &config.limits)?;
    tracing::info!(
        filename,
        width = validated.width,
        height = validated.height,
        "Upload validated"
    );

    // Content-addressed write of the original; the annotated version will
    // overwrite this same key.
    let key = storage_key(filename);
    media.store(&key, bytes)?;
    let image_url = config.media_url(&key);
    let uploaded_at = Utc::now();

    let predictions = inference.infer(&image_url).await?;

    let annotated = annotator.render(&validated.image, &predictions)?;
    media.store(&key, &annotated)?;

    let extraction = extract(&predictions);
    let Extraction::Verdict {
        diagnosis,
        porcentaje,
    } = extraction
    else {
        tracing::warn!(filename, "Inference returned no predictions; aborting");
        return Err(PipelineError::NoPrediction);
    };

    let record = create_history(
        conn,
        &NewHistory {
            user_id,
            storage_key: &key,
            paciente_nombre,
            grupo: diagnosis,
            porcentaje,
            uploaded_at,
        },
    )?;

    Ok(UploadOutcome {
        record,
        prediction_count: predictions.len(),
        processed_image_url: image_url,
    })
}
