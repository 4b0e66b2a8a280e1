use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Listen address for the HTTP surface (default: 0.0.0.0:8080).
    pub listen_addr: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// External verification collaborator endpoint.
    pub verifier_url: String,
    /// Merchant credential pair sent with every collaborator call.
    pub merchant_id: String,
    pub merchant_key: String,
    /// Timeout in seconds for one collaborator request.
    pub verify_timeout_secs: u64,
    /// Minimum plausible byte length for a submitted image; anything
    /// smaller is rejected as truncated before any external call.
    pub min_image_bytes: usize,
    /// Upload ceiling for a submitted image, in bytes.
    pub max_image_bytes: usize,
}

impl Config {
    /// Load configuration from `IDGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("idgate");

        let db_path = std::env::var("IDGATE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("idgate.db"));

        Self {
            listen_addr: std::env::var("IDGATE_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            db_path,
            verifier_url: std::env::var("IDGATE_VERIFIER_URL").unwrap_or_default(),
            merchant_id: std::env::var("IDGATE_MERCHANT_ID").unwrap_or_default(),
            merchant_key: std::env::var("IDGATE_MERCHANT_KEY").unwrap_or_default(),
            verify_timeout_secs: env_u64("IDGATE_VERIFY_TIMEOUT_SECS", 15),
            min_image_bytes: env_usize("IDGATE_MIN_IMAGE_BYTES", 1024),
            max_image_bytes: env_usize("IDGATE_MAX_IMAGE_BYTES", 2 * 1024 * 1024),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
