//! API error types with structured JSON responses.
//!
//! Every failure crossing the HTTP boundary is converted here into a
//! `(status, code, message)` triple: the machine code is stable, the
//! message is the Spanish user-facing text. Internal detail is logged,
//! never leaked.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::history::HistoryError;
use crate::db::DatabaseError;
use crate::media::MediaError;
use crate::pipeline::PipelineError;
use crate::report::ReportError;
use crate::validate::ValidationError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email not registered")]
    EmailNotRegistered,
    #[error("Registration rejected: {0}")]
    Registration(String),
    #[error("Upload validation failed")]
    Validation(#[from] ValidationError),
    #[error("Inference failed")]
    Inference,
    #[error("Inference produced no prediction")]
    NoPrediction,
    #[error("Report generation failed: {0}")]
    Report(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Debes iniciar sesión para acceder a esta sección.".to_string(),
            ),
            ApiError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "No tienes permiso para realizar esta acción.".to_string(),
            ),
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone())
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Correo electrónico o contraseña incorrectos.".to_string(),
            ),
            ApiError::EmailNotRegistered => (
                StatusCode::NOT_FOUND,
                "EMAIL_NOT_REGISTERED",
                "El correo electrónico no está registrado en nuestro sistema.".to_string(),
            ),
            ApiError::Registration(detail) => (
                StatusCode::BAD_REQUEST,
                "REGISTRATION_ERROR",
                format!("Error al registrar el usuario: {detail}"),
            ),
            ApiError::Validation(err) => {
                (StatusCode::BAD_REQUEST, validation_code(err), err.to_string())
            }
            ApiError::Inference => (
                StatusCode::BAD_GATEWAY,
                "INFERENCE_ERROR",
                "Error al procesar la imagen con el modelo.".to_string(),
            ),
            ApiError::NoPrediction => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INFERENCE_ERROR",
                "El modelo no produjo ninguna predicción para la imagen.".to_string(),
            ),
            ApiError::Report(detail) => {
                tracing::error!(detail = %detail, "Report generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PDF_GENERATION_ERROR",
                    "Error al generar el PDF.".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Error del servidor. Por favor, intenta nuevamente.".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        (status, Json(body)).into_response()
    }
}

fn validation_code(err: &ValidationError) -> &'static str {
    match err {
        ValidationError::InvalidImageFormat => "INVALID_IMAGE_FORMAT",
        ValidationError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
        ValidationError::ImageInvalid => "IMAGE_INVALID",
        ValidationError::InvalidImageDimensions { .. } => "INVALID_IMAGE_DIMENSIONS",
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::EmailNotRegistered => ApiError::EmailNotRegistered,
            AuthError::InvalidRegistration(msg) => ApiError::Registration(msg),
            AuthError::Hashing => ApiError::Internal("password hashing".into()),
            AuthError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => ApiError::Validation(e),
            PipelineError::Inference(e) => {
                tracing::error!(error = %e, "Upload pipeline inference failure");
                ApiError::Inference
            }
            PipelineError::NoPrediction => ApiError::NoPrediction,
            PipelineError::Media(e) => ApiError::Internal(e.to_string()),
            PipelineError::Annotation(e) => ApiError::Internal(e.to_string()),
            PipelineError::History(e) => e.into(),
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Validation(msg) => ApiError::BadRequest(msg),
            HistoryError::Database(e) => ApiError::Internal(e.to_string()),
            HistoryError::Media(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Report(err.to_string())
    }
}
