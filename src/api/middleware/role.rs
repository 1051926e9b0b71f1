//! Superuser gate for the privileged (`_gene`) routes.
//!
//! Runs after `require_auth` has injected `UserContext`; a non-superuser
//! principal gets a structured 403.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::UserContext;

pub async fn require_superuser(req: Request<axum::body::Body>, next: Next) -> Response {
    let Some(user) = req.extensions().get::<UserContext>() else {
        return ApiError::Internal("role check before auth".into()).into_response();
    };

    if !user.is_superuser {
        tracing::warn!(
            username = %user.username,
            path = req.uri().path(),
            "Privileged route denied"
        );
        return ApiError::PermissionDenied.into_response();
    }

    next.run(req).await
}
