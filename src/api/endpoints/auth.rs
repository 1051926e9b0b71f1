//! Authentication endpoints.
//!
//! `GET  /login`          — session status (public)
//! `POST /login`          — email+password ⇒ bearer token
//! `GET/POST /register`   — create account, auto-login
//! `POST /logout`         — destroy session (protected)
//! `GET/POST /password_reset` — request a reset link (dispatch is logged)
//! `GET  /`               — authenticated index/welcome

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::auth;
use crate::config::{APP_NAME, APP_VERSION};

#[derive(Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
}

impl From<crate::db::users::User> for UserView {
    fn from(u: crate::db::users::User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            is_superuser: u.is_superuser,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserView,
    pub message: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /login` — authenticate by email and password.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let (user, token) =
        auth::authenticate_by_email(&conn, request.email.trim(), &request.password)?;

    Ok(Json(SessionResponse {
        token,
        user: user.into(),
        message: "Sesión iniciada correctamente.".into(),
    }))
}

#[derive(Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

/// `GET /login` — report whether the presented token (if any) is a live
/// session.
pub async fn session_status(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<SessionStatus>, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let user = match token {
        Some(token) => {
            let conn = ctx.open_db()?;
            auth::resolve_session(&conn, token)?
        }
        None => None,
    };

    Ok(Json(SessionStatus {
        authenticated: user.is_some(),
        user: user.map(UserView::from),
    }))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub password2: Option<String>,
}

/// `POST /register` — create an account and log it in.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if let Some(confirm) = &request.password2 {
        if confirm != &request.password {
            return Err(ApiError::Registration("las contraseñas no coinciden".into()));
        }
    }

    let conn = ctx.open_db()?;
    let (user, token) = auth::register_user(
        &conn,
        &request.username,
        request.email.trim(),
        &request.password,
    )?;

    Ok(Json(SessionResponse {
        token,
        user: user.into(),
        message: "¡Registro exitoso! Has iniciado sesión automáticamente.".into(),
    }))
}

#[derive(Serialize)]
pub struct RegisterInfo {
    pub required_fields: &'static [&'static str],
    pub min_password_length: usize,
}

/// `GET /register` — field requirements for the registration form.
pub async fn register_info() -> Json<RegisterInfo> {
    Json(RegisterInfo {
        required_fields: &["username", "email", "password"],
        min_password_length: 8,
    })
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /logout` — destroy the presented session.
pub async fn logout(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let conn = ctx.open_db()?;
    auth::logout(&conn, token)?;

    Ok(Json(MessageResponse {
        message: "Sesión cerrada correctamente.".into(),
    }))
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// `POST /password_reset` — request a reset link for a registered email.
pub async fn password_reset(
    State(ctx): State<ApiContext>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.open_db()?;
    auth::request_password_reset(&conn, request.email.trim())?;

    Ok(Json(MessageResponse {
        message:
            "Se ha enviado un enlace para restablecer la contraseña a tu correo electrónico."
                .into(),
    }))
}

/// `GET /password_reset` — form description.
pub async fn password_reset_info() -> Json<RegisterInfo> {
    Json(RegisterInfo {
        required_fields: &["email"],
        min_password_length: 8,
    })
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub app: &'static str,
    pub version: &'static str,
    pub message: String,
    pub username: String,
    pub is_superuser: bool,
}

/// `GET /` — authenticated landing data.
pub async fn index(Extension(user): Extension<UserContext>) -> Json<IndexResponse> {
    Json(IndexResponse {
        app: APP_NAME,
        version: APP_VERSION,
        message: format!("Bienvenido, {}.", user.username),
        username: user.username,
        is_superuser: user.is_superuser,
    })
}
