//! Bearer session authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! sessions table, and injects `UserContext` into request extensions for
//! downstream handlers. The explicit middleware replaces the
//! catch-and-redirect decorator style: unauthenticated requests get a
//! structured 401 instead of a redirect.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::auth;

/// Require a live session token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension
/// layer). On success: injects `UserContext` and marks the response
/// non-cacheable.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let conn = ctx.open_db()?;
    let user = auth::resolve_session(&conn, &token)?
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(UserContext {
        user_id: user.id,
        username: user.username,
        is_superuser: user.is_superuser,
    });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
