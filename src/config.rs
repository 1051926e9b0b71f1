use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "RadScan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed local time zone for record timestamps: America/Guayaquil (UTC-5,
/// no DST), matching the clinic the service is deployed for.
pub const LOCAL_TZ_OFFSET_SECS: i32 = -5 * 3600;

/// Timeout for every outbound HTTP call (inference, media fetch-back).
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/RadScan/ on all platforms (user-visible, per deployment requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("RadScan")
}

/// Upload validation limits. Fixed product constants, carried in the config
/// so components receive them by reference instead of reaching for globals.
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    pub allowed_extensions: &'static [&'static str],
    pub max_file_size: u64,
    pub min_dimension: u32,
    pub max_dimension: u32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            allowed_extensions: &["jpg", "jpeg", "png", "gif", "bmp"],
            max_file_size: 10 * 1024 * 1024,
            min_dimension: 100,
            max_dimension: 10_000,
        }
    }
}

/// External inference endpoint configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_url: String,
    pub model_id: String,
    /// Unset key means every inference call fails with `MissingApiKey`.
    pub api_key: Option<String>,
}

/// Process-wide configuration, loaded once at startup from the environment
/// and passed by reference into every component that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Base URL under which this instance is reachable; used to build the
    /// public `/media/<key>` URLs handed to the inference API and stored
    /// with history records.
    pub public_base_url: String,
    pub data_dir: PathBuf,
    pub inference: InferenceConfig,
    /// TTF used for annotation labels. Labels are skipped (with a warning)
    /// when no font can be loaded.
    pub label_font_path: Option<PathBuf>,
    pub limits: ValidationLimits,
}

impl AppConfig {
    /// Load configuration from `RADSCAN_*` environment variables, falling
    /// back to deployment defaults.
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("RADSCAN_BIND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let public_base_url = std::env::var("RADSCAN_BASE_URL")
            .unwrap_or_else(|_| format!("http://{bind_addr}"));

        let data_dir = std::env::var("RADSCAN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| app_data_dir());

        let inference = InferenceConfig {
            api_url: std::env::var("RADSCAN_INFERENCE_URL")
                .unwrap_or_else(|_| "https://outline.roboflow.com".to_string()),
            model_id: std::env::var("RADSCAN_MODEL_ID")
                .unwrap_or_else(|_| "proy_2/1".to_string()),
            api_key: std::env::var("RADSCAN_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        let label_font_path = std::env::var("RADSCAN_LABEL_FONT")
            .map(PathBuf::from)
            .ok()
            .or_else(default_label_font);

        Self {
            bind_addr,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            data_dir,
            inference,
            label_font_path,
            limits: ValidationLimits::default(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("radscan.db")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    pub fn media_url(&self, storage_key: &str) -> String {
        format!("{}/media/{storage_key}", self.public_base_url)
    }
}

/// First present TTF among the usual system locations.
fn default_label_font() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/Library/Fonts/Arial.ttf",
    ];
    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}
