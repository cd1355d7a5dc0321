use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.tvmaze.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    base_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
}

pub fn load_config(path: Option<&Path>) -> AppConfig {
    let mut cfg = AppConfig::default();
    let Some(path) = path else {
        info!("No config directory available; using defaults");
        return cfg;
    };

    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<RawConfig>(&raw) {
            Ok(parsed) => {
                if let Some(base_url) = parsed.base_url {
                    let trimmed = base_url.trim();
                    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                        cfg.base_url = trimmed.to_string();
                    } else {
                        warn!("Ignoring base_url `{trimmed}`: expected an http(s) URL");
                    }
                }
                if let Some(secs) = parsed.connect_timeout_secs.filter(|secs| *secs > 0) {
                    cfg.connect_timeout = Duration::from_secs(secs);
                }
                if let Some(secs) = parsed.read_timeout_secs.filter(|secs| *secs > 0) {
                    cfg.read_timeout = Duration::from_secs(secs);
                }
                info!("Loaded config from {}", path.display());
            }
            Err(err) => {
                warn!(
                    "Failed to parse {} ({err}). Using defaults.",
                    path.display()
                );
            }
        },
        Err(_) => {
            info!("No config at {}; using defaults", path.display());
        }
    }

    cfg
}
