use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FLAG_KEY: &str = "is_gate_enabled";
pub const DEFAULT_STORE_PATH: &str = "redbook_destination.json";
const DEFAULT_FLAG_TIMEOUT_SECS: u64 = 10;
const DEFAULT_METRICS_TIMEOUT_SECS: u64 = 30;

/// How long the splash stays up before falling back to the application.
pub const SPLASH_DISPLAY_DELAY: Duration = Duration::from_secs(2);

/// Backoff before re-reading a tracking status that came back `NotDetermined`.
pub const TRACKING_RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bundle_id: String,
    pub metrics_url: String,
    pub metrics_salt: String,
    pub remote_config_url: String,
    pub flag_key: String,
    pub store_path: PathBuf,
    pub flag_timeout: Duration,
    pub metrics_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            bundle_id: env::var("REDBOOK_BUNDLE_ID")
                .map_err(|e| format!("REDBOOK_BUNDLE_ID: {}", e))?,
            metrics_url: env::var("REDBOOK_METRICS_URL")
                .map_err(|e| format!("REDBOOK_METRICS_URL: {}", e))?,
            metrics_salt: env::var("REDBOOK_METRICS_SALT")
                .map_err(|e| format!("REDBOOK_METRICS_SALT: {}", e))?,
            remote_config_url: env::var("REDBOOK_REMOTE_CONFIG_URL")
                .map_err(|e| format!("REDBOOK_REMOTE_CONFIG_URL: {}", e))?,
            flag_key: env::var("REDBOOK_FLAG_KEY").unwrap_or_else(|_| DEFAULT_FLAG_KEY.to_string()),
            store_path: Self::store_path_from_env(),
            flag_timeout: secs_from_env("REDBOOK_FLAG_TIMEOUT_SECS", DEFAULT_FLAG_TIMEOUT_SECS)?,
            metrics_timeout: secs_from_env(
                "REDBOOK_METRICS_TIMEOUT_SECS",
                DEFAULT_METRICS_TIMEOUT_SECS,
            )?,
        })
    }

    /// Persisted slot location alone, for commands that only touch the slot.
    pub fn store_path_from_env() -> PathBuf {
        store_path_or_default(env::var("REDBOOK_STORE_PATH").ok())
    }
}

fn store_path_or_default(raw: Option<String>) -> PathBuf {
    raw.filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from)
}

fn secs_from_env(name: &str, default: u64) -> Result<Duration, String> {
    match env::var(name) {
        Ok(raw) => parse_secs(&raw).map_err(|e| format!("{name}: {e}")),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("expected whole seconds, got '{raw}'"))?;
    if secs == 0 {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}
