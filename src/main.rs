use tracing_subscriber::EnvFilter;

use radscan::api::server;
use radscan::api::types::ApiContext;
use radscan::config::{self, AppConfig};
use radscan::db;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = AppConfig::from_env();
    if app_config.inference.api_key.is_none() {
        tracing::warn!("RADSCAN_API_KEY is not set; uploads will fail at inference");
    }

    if let Err(e) = std::fs::create_dir_all(&app_config.data_dir) {
        tracing::error!(error = %e, dir = %app_config.data_dir.display(), "Cannot create data directory");
        std::process::exit(1);
    }

    // Run migrations once before serving.
    if let Err(e) = db::open_database(&app_config.database_path()) {
        tracing::error!(error = %e, "Database initialization failed");
        std::process::exit(1);
    }

    let ctx = match ApiContext::new(app_config) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, "Cannot initialize application context");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(ctx).await {
        tracing::error!(error = %e, "Server terminated with error");
        std::process::exit(1);
    }
}
