//! Client configuration

use std::path::PathBuf;

use crate::{ClientError, ClientResult};

/// Default hosted service address (local development stack)
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:54321";
/// File name of the persisted session inside the data directory
pub const SESSION_FILE: &str = "session.json";

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL (e.g., "https://project.example.co")
    pub service_url: String,

    /// Public API key sent as `apikey` on every request
    pub api_key: String,

    /// Realtime base URL; derived from `service_url` when unset
    pub realtime_url: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Realtime heartbeat interval in seconds
    pub heartbeat_interval: u64,

    /// Directory holding `session.json`
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(service_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            realtime_url: None,
            timeout: 30,
            heartbeat_interval: 30,
            data_dir: PathBuf::from(".vendor-store"),
        }
    }

    /// Load configuration from environment variables
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | STORE_SERVICE_URL | http://localhost:54321 |
    /// | STORE_API_KEY | (empty) |
    /// | STORE_REALTIME_URL | derived |
    /// | STORE_REQUEST_TIMEOUT | 30 |
    /// | STORE_DATA_DIR | .vendor-store |
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("STORE_SERVICE_URL").unwrap_or_else(|_| DEFAULT_SERVICE_URL.into()),
            std::env::var("STORE_API_KEY").unwrap_or_default(),
        );
        config.realtime_url = std::env::var("STORE_REALTIME_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        config.timeout = std::env::var("STORE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        if let Ok(dir) = std::env::var("STORE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set an explicit realtime URL
    pub fn with_realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the realtime heartbeat interval
    pub fn with_heartbeat_interval(mut self, seconds: u64) -> Self {
        self.heartbeat_interval = seconds.max(1);
        self
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.service_url, path.trim_start_matches('/'))
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.service_url, table)
    }

    /// WebSocket endpoint of the realtime service, including the API key
    pub fn realtime_endpoint(&self) -> ClientResult<String> {
        let base = match &self.realtime_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let base = if let Some(rest) = self.service_url.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else if let Some(rest) = self.service_url.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else {
                    return Err(ClientError::Config(format!(
                        "unsupported service url: {}",
                        self.service_url
                    )));
                };
                format!("{base}/realtime/v1")
            }
        };
        let mut url = reqwest::Url::parse(&format!("{base}/websocket"))
            .map_err(|e| ClientError::Config(format!("invalid realtime url {base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", "1.0.0");
        Ok(url.into())
    }

    /// Path of the persisted session file
    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.service_url.is_empty() {
            return Err(ClientError::Config("service url is empty".into()));
        }
        if self.timeout == 0 {
            return Err(ClientError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_URL, "")
    }
}
