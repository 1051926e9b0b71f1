//! Audit logging middleware.
//!
//! Logs every API request with method, path, response status, and the
//! authenticated username when present. Runs innermost, after auth has
//! injected `UserContext`.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::UserContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let username = req
        .extensions()
        .get::<UserContext>()
        .map(|u| u.username.clone());

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        username = username.as_deref().unwrap_or("-"),
        "request"
    );

    response
}
