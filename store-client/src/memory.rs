//! In-memory backend
//!
//! Implements all three backend seams over plain row maps, for the demo mode
//! and for tests. Writes through [`DataService`] (and the seeding helpers
//! that simulate external writers) publish change events exactly like the
//! hosted service does.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use shared::{ChangeEvent, ChangeFilter, ChangeKind};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::query::{Embed, Relation, Select, Update, compare_cells};
use crate::service::{AuthService, AuthSession, AuthUser, ChangeFeed, ChangeStream, DataService};
use crate::{ClientError, ClientResult};

/// Change broadcast capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;
/// Per-subscription buffer between the broadcast and the consumer
const STREAM_BUFFER: usize = 64;

type Row = Map<String, Value>;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: AuthUser,
}

struct Inner {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    accounts: RwLock<HashMap<String, Account>>,
    /// Issued tokens, removed on sign-out
    tokens: RwLock<HashMap<String, AuthUser>>,
    session: RwLock<Option<AuthSession>>,
    failing_tables: RwLock<HashSet<String>>,
    event_tx: broadcast::Sender<ChangeEvent>,
}

/// Shared handle to an in-memory backend; clones see the same data
#[derive(Clone)]
pub struct MemoryService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("tables", &self.inner.tables.read().keys().collect::<Vec<_>>())
            .field("event_tx", &"<broadcast::Sender>")
            .finish()
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryService {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(HashMap::new()),
                accounts: RwLock::new(HashMap::new()),
                tokens: RwLock::new(HashMap::new()),
                session: RwLock::new(None),
                failing_tables: RwLock::new(HashSet::new()),
                event_tx,
            }),
        }
    }

    /// Register a password account for `user_id`
    pub fn add_account(&self, email: &str, password: &str, user_id: &str) {
        self.inner.accounts.write().insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: AuthUser {
                    id: user_id.to_string(),
                    email: Some(email.to_string()),
                },
            },
        );
    }

    /// Store a row without publishing a change (fixture setup)
    pub fn seed(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.inner
                .tables
                .write()
                .entry(table.to_string())
                .or_default()
                .push(row);
        }
    }

    /// Insert a row the way an external writer would, publishing an insert
    pub fn insert_external(&self, table: &str, row: Value) -> ClientResult<Value> {
        let row = self.insert_row(table, row)?;
        Ok(Value::Object(row))
    }

    /// Update a row by id the way an external writer would
    pub fn update_external(&self, table: &str, id: &str, fields: Value) -> ClientResult<Value> {
        let Value::Object(fields) = fields else {
            return Err(ClientError::Validation("update fields must be an object".into()));
        };
        let update = Update::table(table).values(fields).eq("id", id);
        self.update_rows(&update)
            .into_iter()
            .next()
            .map(Value::Object)
            .ok_or_else(|| ClientError::NotFound(format!("{table} {id}")))
    }

    /// Publish a raw event, e.g. a redelivery
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Make every write to `table` fail with a service error
    pub fn fail_writes_to(&self, table: &str) {
        self.inner.failing_tables.write().insert(table.to_string());
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .tables
            .read()
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub fn find(&self, table: &str, id: &str) -> Option<Value> {
        self.inner.tables.read().get(table).and_then(|rows| {
            rows.iter()
                .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
                .cloned()
                .map(Value::Object)
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.event_tx.receiver_count()
    }

    fn check_writable(&self, table: &str) -> ClientResult<()> {
        if self.inner.failing_tables.read().contains(table) {
            return Err(ClientError::Service {
                status: 503,
                message: format!("writes to {table} are unavailable"),
            });
        }
        Ok(())
    }

    fn insert_row(&self, table: &str, row: Value) -> ClientResult<Row> {
        self.check_writable(table)?;
        let Value::Object(mut row) = row else {
            return Err(ClientError::Validation("row must be an object".into()));
        };
        row.entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        row.entry("created_at")
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

        self.inner
            .tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        self.publish(change(ChangeKind::Insert, table, row.clone(), None));
        Ok(row)
    }

    fn update_rows(&self, update: &Update) -> Vec<Row> {
        let mut changed: Vec<(Row, Row)> = Vec::new();
        {
            let mut tables = self.inner.tables.write();
            let Some(rows) = tables.get_mut(&update.table) else {
                return Vec::new();
            };
            for row in rows.iter_mut().filter(|row| update.matches(row)) {
                let old = row.clone();
                for (key, value) in &update.values {
                    row.insert(key.clone(), value.clone());
                }
                changed.push((row.clone(), old));
            }
        }
        changed
            .into_iter()
            .map(|(row, old)| {
                self.publish(change(ChangeKind::Update, &update.table, row.clone(), Some(old)));
                row
            })
            .collect()
    }

    /// Project `row` and attach its embeds, recursively
    fn resolve(&self, tables: &HashMap<String, Vec<Row>>, row: &Row, select: &Select) -> Row {
        let mut out = project(row, select.columns.as_deref());
        for embed in &select.embeds {
            out.insert(embed.alias.clone(), self.resolve_embed(tables, row, embed));
        }
        out
    }

    fn resolve_embed(&self, tables: &HashMap<String, Vec<Row>>, parent: &Row, embed: &Embed) -> Value {
        let children = tables.get(&embed.table).map(Vec::as_slice).unwrap_or_default();
        let nested = Select {
            table: embed.table.clone(),
            columns: embed.columns.clone(),
            embeds: embed.embeds.clone(),
            filters: Vec::new(),
            order: None,
            limit: None,
        };
        match embed.relation {
            Relation::ToOne => {
                let Some(key) = parent.get(&embed.column).filter(|v| !v.is_null()) else {
                    return Value::Null;
                };
                children
                    .iter()
                    .find(|child| child.get("id") == Some(key))
                    .map(|child| Value::Object(self.resolve(tables, child, &nested)))
                    .unwrap_or(Value::Null)
            }
            Relation::ToMany => {
                let Some(id) = parent.get("id") else {
                    return Value::Array(Vec::new());
                };
                Value::Array(
                    children
                        .iter()
                        .filter(|child| child.get(&embed.column) == Some(id))
                        .map(|child| Value::Object(self.resolve(tables, child, &nested)))
                        .collect(),
                )
            }
        }
    }
}

fn project(row: &Row, columns: Option<&[String]>) -> Row {
    match columns {
        Some(cols) if !cols.is_empty() => cols
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
        _ => row.clone(),
    }
}

fn change(kind: ChangeKind, table: &str, record: Row, old_record: Option<Row>) -> ChangeEvent {
    ChangeEvent {
        kind,
        schema: "public".to_string(),
        table: table.to_string(),
        record,
        old_record,
        commit_timestamp: Some(chrono::Utc::now()),
    }
}

#[async_trait]
impl AuthService for MemoryService {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthSession> {
        let account = self
            .inner
            .accounts
            .read()
            .get(&email.to_lowercase())
            .cloned()
            .filter(|account| account.password == password)
            .ok_or(ClientError::InvalidCredentials)?;

        let session = AuthSession {
            access_token: format!("memory-{}", uuid::Uuid::new_v4()),
            refresh_token: None,
            expires_at: None,
            user: account.user,
        };
        self.inner
            .tokens
            .write()
            .insert(session.access_token.clone(), session.user.clone());
        *self.inner.session.write() = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> ClientResult<()> {
        if let Some(session) = self.inner.session.write().take() {
            self.inner.tokens.write().remove(&session.access_token);
        }
        Ok(())
    }

    async fn current_user(&self) -> ClientResult<Option<AuthUser>> {
        Ok(self.inner.session.read().as_ref().map(|s| s.user.clone()))
    }

    async fn restore_session(&self, access_token: &str) -> ClientResult<Option<AuthUser>> {
        let user = self.inner.tokens.read().get(access_token).cloned();
        *self.inner.session.write() = user.clone().map(|user| AuthSession {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
            user,
        });
        Ok(user)
    }

    fn session(&self) -> Option<AuthSession> {
        self.inner.session.read().clone()
    }
}

#[async_trait]
impl DataService for MemoryService {
    async fn select(&self, query: &Select) -> ClientResult<Vec<Value>> {
        let tables = self.inner.tables.read();
        let mut rows: Vec<&Row> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).collect())
            .unwrap_or_default();

        if let Some(sort) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_cells(a.get(&sort.column), b.get(&sort.column));
                if sort.ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .into_iter()
            .map(|row| Value::Object(self.resolve(&tables, row, query)))
            .collect())
    }

    async fn insert(&self, table: &str, row: Value) -> ClientResult<Vec<Value>> {
        let row = self.insert_row(table, row)?;
        Ok(vec![Value::Object(row)])
    }

    async fn update(&self, update: &Update) -> ClientResult<Vec<Value>> {
        self.check_writable(&update.table)?;
        Ok(self.update_rows(update).into_iter().map(Value::Object).collect())
    }
}

#[async_trait]
impl ChangeFeed for MemoryService {
    async fn listen(&self, filter: ChangeFilter) -> ClientResult<ChangeStream> {
        // Subscribe before returning so no event published afterwards is missed
        let mut events = self.inner.event_tx.subscribe();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) if filter.matches(&event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, topic = %filter.topic(), "Change feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(topic = %filter.topic(), "Memory change feed closed");
        });

        Ok(ChangeStream::new(rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> MemoryService {
        let service = MemoryService::new();
        service.seed("users", json!({ "id": "u1", "name": "Ana" }));
        service.seed("orders", json!({ "id": "o1", "user_id": "u1", "restaurant_id": "R1", "created_at": "2024-01-01T10:00:00Z" }));
        service.seed("orders", json!({ "id": "o2", "user_id": null, "restaurant_id": "R1", "created_at": "2024-01-02T10:00:00Z" }));
        service.seed("order_items", json!({ "id": "i1", "order_id": "o1", "quantity": 2 }));
        service
    }

    #[tokio::test]
    async fn test_select_sorts_and_embeds() {
        let service = service();
        let query = Select::from("orders")
            .embed(Embed::one("user", "users", "user_id").columns(&["name"]))
            .embed(Embed::many("items", "order_items", "order_id"))
            .eq("restaurant_id", "R1")
            .order_by("created_at", false);

        let rows = service.select(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "o2");
        assert_eq!(rows[0]["user"], Value::Null);
        assert_eq!(rows[0]["items"], json!([]));
        assert_eq!(rows[1]["user"], json!({ "name": "Ana" }));
        assert_eq!(rows[1]["items"][0]["quantity"], 2);
    }

    #[tokio::test]
    async fn test_update_is_conditional() {
        let service = service();
        let update = Update::table("orders")
            .set("restaurant_id", "R2")
            .eq("id", "o1")
            .eq("restaurant_id", "R9");
        assert!(service.update(&update).await.unwrap().is_empty());
        assert_eq!(service.find("orders", "o1").unwrap()["restaurant_id"], "R1");

        let update = Update::table("orders").set("restaurant_id", "R2").eq("id", "o1");
        let changed = service.update(&update).await.unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0]["restaurant_id"], "R2");

        let missing = Update::table("nowhere").set("x", 1).eq("id", "o1");
        assert!(service.update(&missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_select_orders_timestamps_by_instant() {
        let service = MemoryService::new();
        service.seed("orders", json!({ "id": "a", "created_at": "2024-05-01T10:00:00+02:00" }));
        service.seed("orders", json!({ "id": "b", "created_at": "2024-05-01T09:00:00Z" }));

        let query = Select::from("orders").order_by("created_at", false);
        let rows = service.select(&query).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[tokio::test]
    async fn test_listen_filters_events() {
        let service = service();
        let mut stream = service
            .listen(ChangeFilter::restaurant_orders(ChangeKind::Insert, "R1"))
            .await
            .unwrap();

        service.insert_external("orders", json!({ "id": "o3", "restaurant_id": "R2" })).unwrap();
        service.insert_external("orders", json!({ "id": "o4", "restaurant_id": "R1" })).unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.record_id(), Some("o4"));
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn test_sign_in_and_restore() {
        let service = MemoryService::new();
        service.add_account("Vendor@Test.com", "secret", "u1");

        assert!(matches!(
            service.sign_in_with_password("vendor@test.com", "wrong").await,
            Err(ClientError::InvalidCredentials)
        ));
        let session = service.sign_in_with_password("vendor@test.com", "secret").await.unwrap();
        assert_eq!(session.user.id, "u1");

        let restored = service.restore_session(&session.access_token).await.unwrap();
        assert_eq!(restored.map(|u| u.id), Some("u1".to_string()));

        service.sign_out().await.unwrap();
        assert!(service.current_user().await.unwrap().is_none());
        assert!(service.restore_session(&session.access_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let service = service();
        service.fail_writes_to("notifications");
        let err = service.insert("notifications", json!({ "title": "x" })).await.unwrap_err();
        assert!(matches!(err, ClientError::Service { status: 503, .. }));
        assert!(service.rows("notifications").is_empty());
    }
}
