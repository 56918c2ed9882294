//! Application configuration
//!
//! Client settings come from [`ClientConfig::from_env`]; this adds the
//! logging knobs.
//!
//! | Variable | Default |
//! |----------|---------|
//! | LOG_LEVEL | info |
//! | LOG_JSON | false |
//! | LOG_DIR | (console only) |

use std::path::PathBuf;

use store_client::ClientConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            client: ClientConfig::from_env(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            log_dir: std::env::var("LOG_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn session_file(&self) -> PathBuf {
        self.client.session_file()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
        }
    }
}
