//! SessionStore - persisted vendor session
//!
//! A flat JSON key-value file (`session.json`) in the data directory.
//! Two keys matter to the app: `token` (access token) and `store-id`
//! (restaurant the dashboard opens).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const TOKEN_KEY: &str = "token";
pub const STORE_ID_KEY: &str = "store-id";

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct SessionStore {
    file_path: PathBuf,
    data: BTreeMap<String, String>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token stays out of logs
        f.debug_struct("SessionStore")
            .field("file_path", &self.file_path)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SessionStore {
    /// Empty store backed by `file_path`; nothing is read
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            data: BTreeMap::new(),
        }
    }

    /// Load from file, starting empty when it does not exist yet
    pub fn load(file_path: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let file_path = file_path.into();
        let data = if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { file_path, data })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn save(&self) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Set and persist
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.data.insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Remove and persist
    pub fn remove(&mut self, key: &str) -> Result<(), SessionStoreError> {
        if self.data.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Drop every key and delete the file
    pub fn clear(&mut self) -> Result<(), SessionStoreError> {
        self.data.clear();
        match std::fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.get(TOKEN_KEY)
    }

    pub fn restaurant_id(&self) -> Option<&str> {
        self.get(STORE_ID_KEY)
    }

    /// Persist a successful login in one write
    pub fn store_login(&mut self, token: &str, restaurant_id: &str) -> Result<(), SessionStoreError> {
        self.data.insert(TOKEN_KEY.to_string(), token.to_string());
        self.data.insert(STORE_ID_KEY.to_string(), restaurant_id.to_string());
        self.save()
    }

    /// Stored token that has not expired at `now` (Unix seconds).
    ///
    /// Tokens without a readable `exp` claim count as valid; the service
    /// still gets the final word when the session is restored.
    pub fn valid_token(&self, now: u64) -> Option<&str> {
        self.token()
            .filter(|token| parse_jwt_exp(token).is_none_or(|exp| exp > now))
    }
}

/// Expiry (Unix seconds) from the `exp` claim of a JWT
pub fn parse_jwt_exp(token: &str) -> Option<u64> {
    // header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).ok()?;
    payload.get("exp")?.as_u64()
}
