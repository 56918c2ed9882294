//! Backend seams
//!
//! The storefront needs three things from its backend: password auth, row
//! reads and writes, and a push feed of row changes. Each is a trait so the
//! hosted service ([`crate::HttpService`], [`crate::SocketChangeFeed`]) and
//! the in-memory service ([`crate::MemoryService`]) are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{ChangeEvent, ChangeFilter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ClientResult;
use crate::query::{Select, Update};

/// Authenticated identity as the auth service reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Password grant. Keeps the resulting session for later requests.
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> ClientResult<AuthSession>;

    /// Invalidate the session. The local session is dropped even when the
    /// service call fails.
    async fn sign_out(&self) -> ClientResult<()>;

    /// Identity behind the current session, `None` without one
    async fn current_user(&self) -> ClientResult<Option<AuthUser>>;

    /// Re-attach a persisted access token and validate it
    async fn restore_session(&self, access_token: &str) -> ClientResult<Option<AuthUser>>;

    fn session(&self) -> Option<AuthSession>;
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn select(&self, query: &Select) -> ClientResult<Vec<Value>>;

    /// Insert one row, returning the stored representation
    async fn insert(&self, table: &str, row: Value) -> ClientResult<Vec<Value>>;

    /// Apply a conditional update, returning every row it changed
    async fn update(&self, update: &Update) -> ClientResult<Vec<Value>>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a feed for one filter. Events matching the filter are delivered
    /// at least once, in commit order.
    async fn listen(&self, filter: ChangeFilter) -> ClientResult<ChangeStream>;
}

/// Receiving end of one change feed.
///
/// Dropping the stream stops the task feeding it.
#[derive(Debug)]
pub struct ChangeStream {
    rx: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl ChangeStream {
    pub fn new(rx: mpsc::Receiver<ChangeEvent>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Next event, `None` once the feed has closed
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
