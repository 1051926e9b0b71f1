//! Shared types for the API layer.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use crate::annotate::AnnotationRenderer;
use crate::config::{AppConfig, HTTP_TIMEOUT};
use crate::db::{open_database, DatabaseError};
use crate::inference::InferenceClient;
use crate::media::MediaStore;

/// Shared context for all API routes and middleware: the process
/// configuration plus the long-lived service objects built from it.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub media: Arc<MediaStore>,
    pub inference: Arc<InferenceClient>,
    pub annotator: Arc<AnnotationRenderer>,
    /// Client for media fetch-back (report embedding); carries the fixed
    /// request timeout.
    pub http: reqwest::Client,
    db_path: PathBuf,
}

impl ApiContext {
    pub fn new(config: AppConfig) -> Result<Self, std::io::Error> {
        let media = MediaStore::new(config.media_dir())?;
        let inference = InferenceClient::new(config.inference.clone());
        let annotator = AnnotationRenderer::from_font_path(config.label_font_path.as_deref());
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        let db_path = config.database_path();

        Ok(Self {
            config: Arc::new(config),
            media: Arc::new(media),
            inference: Arc::new(inference),
            annotator: Arc::new(annotator),
            http,
            db_path,
        })
    }

    /// Open a connection for the current request. Handlers open their own
    /// connection; isolation is delegated to SQLite.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        open_database(&self.db_path)
    }
}

/// Authenticated principal, injected into request extensions by the auth
/// middleware after session validation. The rest of the system reads only
/// the username and the superuser flag.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: i64,
    pub username: String,
    pub is_superuser: bool,
}
