//! API router.
//!
//! Middleware stacks (outermost → innermost):
//! - protected routes: Extension → auth → audit → handler
//! - privileged routes: Extension → auth → superuser → audit → handler
//! - public routes: Extension → handler
//!
//! `/media/*` is served straight from the blob store directory.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Upload bodies carry up to a 10 MiB image plus multipart framing.
const BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Build the application router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer). Endpoint handlers use `State<ApiContext>` (via `with_state`).
pub fn app_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    // Extension must be outermost so all middleware can access ApiContext.
    let protected = Router::new()
        .route("/", get(endpoints::auth::index))
        .route("/logout", post(endpoints::auth::logout))
        .route(
            "/subir",
            get(endpoints::upload::info).post(endpoints::upload::subir),
        )
        .route("/historial_med", get(endpoints::history::own))
        .route("/historial/ver/:id", get(endpoints::history::view))
        .route(
            "/historial/eliminar/:id",
            post(endpoints::history::delete_own),
        )
        .route("/historial/stats", get(endpoints::history::stats))
        .route("/generar_pdf_fila/:id", get(endpoints::reports::single_pdf))
        .route(
            "/descargar_pdf_general",
            get(endpoints::reports::general_pdf),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Privileged routes additionally require the superuser flag; the role
    // check runs after auth has injected UserContext.
    let privileged = Router::new()
        .route("/historial_med_gene", get(endpoints::history::all))
        .route(
            "/historial/eliminar/gene/:id",
            post(endpoints::history::delete_any),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::role::require_superuser))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route(
            "/login",
            get(endpoints::auth::session_status).post(endpoints::auth::login),
        )
        .route(
            "/register",
            get(endpoints::auth::register_info).post(endpoints::auth::register),
        )
        .route(
            "/password_reset",
            get(endpoints::auth::password_reset_info).post(endpoints::auth::password_reset),
        )
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone());

    let media = Router::new().nest_service("/media", ServeDir::new(ctx.media.root()));

    Router::new()
        .merge(protected)
        .merge(privileged)
        .merge(public)
        .merge(media)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ApiContext;
    use crate::config::{AppConfig, InferenceConfig};
    use crate::db::open_database;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_ctx() -> (tempfile::TempDir, ApiContext) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::from_env();
        config.data_dir = dir.path().to_path_buf();
        config.public_base_url = "http://127.0.0.1:0".into();
        config.inference = InferenceConfig {
            api_url: "http://127.0.0.1:1".into(),
            model_id: "proy_2/1".into(),
            api_key: Some("test".into()),
        };
        config.label_font_path = None;
        // Run migrations once up front, as main() does.
        open_database(&config.database_path()).unwrap();
        let ctx = ApiContext::new(config).unwrap();
        (dir, ctx)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(router: &Router, username: &str) -> String {
        let body = serde_json::json!({
            "username": username,
            "email": format!("{username}@clinic.ec"),
            "password": "secret-pass-123"
        });
        let response = router
            .clone()
            .oneshot(
                Request::post("/register")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["token"].as_str().unwrap().to_string()
    }

    fn authed(token: &str, method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_token() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);

        for uri in ["/", "/historial_med", "/subir", "/descargar_pdf_general"] {
            let response = router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn register_login_logout_cycle() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);
        let token = register(&router, "doc").await;

        // Token works.
        let response = router.clone().oneshot(authed(&token, "GET", "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["username"], "doc");

        // Session status reflects it.
        let response = router
            .clone()
            .oneshot(authed(&token, "GET", "/login"))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["authenticated"], true);

        // Logout, then the same token is rejected.
        let response = router
            .clone()
            .oneshot(authed(&token, "POST", "/logout"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.clone().oneshot(authed(&token, "GET", "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_with_wrong_credentials_is_401() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);
        register(&router, "doc").await;

        let body = serde_json::json!({"email": "doc@clinic.ec", "password": "wrong"});
        let response = router
            .oneshot(
                Request::post("/login")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn privileged_routes_require_superuser() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx.clone());
        let token = register(&router, "doc").await;

        let response = router
            .clone()
            .oneshot(authed(&token, "GET", "/historial_med_gene"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "PERMISSION_DENIED");

        // Promote and retry.
        {
            let conn = ctx.open_db().unwrap();
            crate::db::users::set_superuser(&conn, 1, true).unwrap();
        }
        let response = router
            .clone()
            .oneshot(authed(&token, "GET", "/historial_med_gene"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_history_lists_cleanly() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);
        let token = register(&router, "doc").await;

        let response = router
            .oneshot(authed(&token, "GET", "/historial_med"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn deleting_unknown_record_is_404() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);
        let token = register(&router, "doc").await;

        let response = router
            .oneshot(authed(&token, "POST", "/historial/eliminar/99"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"]["message"], "No se encontró el registro.");
    }

    #[tokio::test]
    async fn password_reset_for_unknown_email_is_404() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);

        let body = serde_json::json!({"email": "ghost@clinic.ec"});
        let response = router
            .oneshot(
                Request::post("/password_reset")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "EMAIL_NOT_REGISTERED");
    }

    #[tokio::test]
    async fn upload_requires_patient_name() {
        let (_dir, ctx) = test_ctx();
        let router = app_router(ctx);
        let token = register(&router, "doc").await;

        let boundary = "----radscan-test";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"imagen\"; filename=\"x.png\"\r\n\
             Content-Type: image/png\r\n\r\nnot-a-real-image\r\n--{boundary}--\r\n"
        );
        let response = router
            .oneshot(
                Request::post("/subir")
                    .header("Authorization", format!("Bearer {token}"))
                    .header(
                        "Content-Type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["message"], "El nombre del paciente es obligatorio.");
    }
}
